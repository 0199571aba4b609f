// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// KCSE grade arithmetic.
//
// Letter grades map to points A = 12 down to E = 1. The mean grade is the
// mean of the best seven subjects, rounded to the nearest point.

/// Subjects counted towards the mean grade.
pub const COUNTED_SUBJECTS: usize = 7;

const GRADES: [(&str, u32); 12] = [
    ("A", 12),
    ("A-", 11),
    ("B+", 10),
    ("B", 9),
    ("B-", 8),
    ("C+", 7),
    ("C", 6),
    ("C-", 5),
    ("D+", 4),
    ("D", 3),
    ("D-", 2),
    ("E", 1),
];

pub fn grade_points(grade: &str) -> Option<u32> {
    let grade = grade.trim();
    GRADES
        .iter()
        .find(|(g, _)| g.eq_ignore_ascii_case(grade))
        .map(|(_, p)| *p)
}

/// Letter grade for a mean, rounded to the nearest point.
pub fn grade_for_points(points: f32) -> &'static str {
    let rounded = (points.round() as i64).clamp(1, 12) as u32;
    GRADES
        .iter()
        .find(|(_, p)| *p == rounded)
        .map_or("E", |(g, _)| g)
}

/// Split a normalised grade list (`SUBJECT=GRADE;...`) into pairs. Entries
/// without `=` are skipped.
pub fn parse_grade_list(list: &str) -> Vec<(String, String)> {
    list.split(';')
        .filter_map(|entry| {
            let (subject, grade) = entry.split_once('=')?;
            let subject = subject.trim();
            let grade = grade.trim();
            (!subject.is_empty() && !grade.is_empty())
                .then(|| (subject.to_uppercase(), grade.to_uppercase()))
        })
        .collect()
}

/// Mean points over the best seven graded subjects, or over all of them
/// when fewer were sat. `None` when no grade is recognised.
pub fn mean_points(grades: &[(String, String)]) -> Option<f32> {
    let mut points: Vec<u32> = grades.iter().filter_map(|(_, g)| grade_points(g)).collect();
    if points.is_empty() {
        return None;
    }
    points.sort_unstable_by(|a, b| b.cmp(a));
    points.truncate(COUNTED_SUBJECTS);
    Some(points.iter().sum::<u32>() as f32 / points.len() as f32)
}

/// How a declared mean grade compares with the subject grades.
#[derive(Debug, Clone, PartialEq)]
pub enum MeanGradeCheck {
    Consistent { computed: f32 },
    Inconsistent { declared: u32, computed: f32 },
    /// The declared grade is not a grade, or no subject grade is.
    Unreadable,
}

pub fn check_mean_grade(declared: &str, grade_list: &str, tolerance: f32) -> MeanGradeCheck {
    let Some(declared_points) = grade_points(declared) else {
        return MeanGradeCheck::Unreadable;
    };
    let Some(computed) = mean_points(&parse_grade_list(grade_list)) else {
        return MeanGradeCheck::Unreadable;
    };
    if (declared_points as f32 - computed).abs() <= tolerance {
        MeanGradeCheck::Consistent { computed }
    } else {
        MeanGradeCheck::Inconsistent {
            declared: declared_points,
            computed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_scale() {
        assert_eq!(grade_points("A"), Some(12));
        assert_eq!(grade_points("b+"), Some(10));
        assert_eq!(grade_points(" E "), Some(1));
        assert_eq!(grade_points("F"), None);
        assert_eq!(grade_for_points(6.4), "C");
        assert_eq!(grade_for_points(10.6), "A-");
        assert_eq!(grade_for_points(0.0), "E");
    }

    #[test]
    fn best_seven_count() {
        let list = "ENGLISH=A;KISWAHILI=A;MATHEMATICS=A;BIOLOGY=A;CHEMISTRY=A;\
                    PHYSICS=A;HISTORY=A;GEOGRAPHY=E";
        let grades = parse_grade_list(list);
        assert_eq!(grades.len(), 8);
        assert_eq!(mean_points(&grades), Some(12.0));
    }

    #[test]
    fn declared_a_against_c_subjects() {
        let list = "ENGLISH=C;KISWAHILI=C+;MATHEMATICS=C-;BIOLOGY=C;CHEMISTRY=C;\
                    HISTORY=C;BUSINESS STUDIES=C";
        assert!(matches!(
            check_mean_grade("A", list, 1.0),
            MeanGradeCheck::Inconsistent { declared: 12, computed } if (computed - 6.0).abs() < 1e-6
        ));
        assert!(matches!(
            check_mean_grade("C", list, 1.0),
            MeanGradeCheck::Consistent { .. }
        ));
    }

    #[test]
    fn unreadable_inputs() {
        assert_eq!(check_mean_grade("Z", "ENGLISH=A", 1.0), MeanGradeCheck::Unreadable);
        assert_eq!(check_mean_grade("A", "", 1.0), MeanGradeCheck::Unreadable);
    }
}
