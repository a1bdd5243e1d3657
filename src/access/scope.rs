// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scope filters computed by the engine and applied by callers.

use std::collections::BTreeSet;

use super::{ClassId, Visibility};

/// Predicate restricting which records of a collection a principal may see.
///
/// `Empty` is an allowed outcome that matches nothing. It is distinct from a
/// denial: list endpoints answer `[]` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every record is visible.
    Unrestricted,
    /// No record is visible.
    Empty,
    /// Records whose class is one of the given classes.
    Classes(BTreeSet<ClassId>),
    /// Only the record belonging to this registration id.
    Registration(String),
    /// Marks of one student for one exam.
    StudentMarks {
        registration_id: String,
        exam: String,
    },
    /// Announcements addressed to everyone or to the given class.
    Audience { class: Option<ClassId> },
}

/// Attributes of a stored record that scopes are evaluated against.
pub trait ScopeTarget {
    fn scope_class(&self) -> Option<ClassId>;

    fn scope_registration(&self) -> Option<&str> {
        None
    }

    fn scope_exam(&self) -> Option<&str> {
        None
    }

    fn scope_visibility(&self) -> Option<Visibility> {
        None
    }
}

impl Scope {
    /// Scope over a teacher's assigned classes; no classes means nothing.
    pub fn for_classes(classes: &BTreeSet<ClassId>) -> Self {
        if classes.is_empty() {
            Scope::Empty
        } else {
            Scope::Classes(classes.clone())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Scope::Empty)
    }

    /// Whether a single record falls inside this scope.
    pub fn admits<T: ScopeTarget + ?Sized>(&self, target: &T) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Empty => false,
            Scope::Classes(classes) => target
                .scope_class()
                .is_some_and(|class| classes.contains(&class)),
            Scope::Registration(registration_id) => {
                target.scope_registration() == Some(registration_id.as_str())
            }
            Scope::StudentMarks {
                registration_id,
                exam,
            } => {
                target.scope_registration() == Some(registration_id.as_str())
                    && target.scope_exam() == Some(exam.as_str())
            }
            Scope::Audience { class } => match target.scope_visibility() {
                Some(Visibility::All) => true,
                Some(Visibility::Class | Visibility::Student) => {
                    class.is_some() && target.scope_class() == *class
                }
                Some(Visibility::Teacher) | None => false,
            },
        }
    }

    /// Keep only the records this scope admits.
    pub fn retain<T: ScopeTarget>(&self, records: Vec<T>) -> Vec<T> {
        match self {
            Scope::Unrestricted => records,
            Scope::Empty => Vec::new(),
            _ => records.into_iter().filter(|r| self.admits(r)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        class: Option<ClassId>,
        reg: &'static str,
        exam: &'static str,
        visibility: Option<Visibility>,
    }

    impl ScopeTarget for Row {
        fn scope_class(&self) -> Option<ClassId> {
            self.class
        }
        fn scope_registration(&self) -> Option<&str> {
            Some(self.reg)
        }
        fn scope_exam(&self) -> Option<&str> {
            Some(self.exam)
        }
        fn scope_visibility(&self) -> Option<Visibility> {
            self.visibility
        }
    }

    fn class(n: i64) -> ClassId {
        ClassId::new(n).unwrap()
    }

    fn row(class_n: i64, reg: &'static str, exam: &'static str) -> Row {
        Row {
            class: Some(class(class_n)),
            reg,
            exam,
            visibility: None,
        }
    }

    #[test]
    fn empty_class_set_collapses_to_empty_scope() {
        assert_eq!(Scope::for_classes(&BTreeSet::new()), Scope::Empty);
        assert!(Scope::Empty.retain(vec![row(10, "S1", "Mid")]).is_empty());
    }

    #[test]
    fn class_scope_filters_by_membership() {
        let scope = Scope::for_classes(&[class(10), class(11)].into_iter().collect());
        let kept = scope.retain(vec![row(10, "S1", "Mid"), row(12, "S2", "Mid"), row(11, "S3", "Mid")]);
        let regs: Vec<_> = kept.iter().map(|r| r.reg).collect();
        assert_eq!(regs, vec!["S1", "S3"]);
    }

    #[test]
    fn student_marks_scope_ignores_class_matches() {
        let scope = Scope::StudentMarks {
            registration_id: "S1".into(),
            exam: "Mid-Term".into(),
        };
        assert!(scope.admits(&row(10, "S1", "Mid-Term")));
        assert!(!scope.admits(&row(10, "S2", "Mid-Term")));
        assert!(!scope.admits(&row(10, "S1", "Final")));
    }

    #[test]
    fn audience_scope_admits_global_and_own_class() {
        let scope = Scope::Audience {
            class: Some(class(10)),
        };
        let announcement = |visibility, class_n: Option<i64>| Row {
            class: class_n.map(class),
            reg: "",
            exam: "",
            visibility: Some(visibility),
        };
        assert!(scope.admits(&announcement(Visibility::All, None)));
        assert!(scope.admits(&announcement(Visibility::Class, Some(10))));
        assert!(scope.admits(&announcement(Visibility::Student, Some(10))));
        assert!(!scope.admits(&announcement(Visibility::Class, Some(11))));
        assert!(!scope.admits(&announcement(Visibility::Teacher, None)));

        let unenrolled = Scope::Audience { class: None };
        assert!(unenrolled.admits(&announcement(Visibility::All, None)));
        assert!(!unenrolled.admits(&announcement(Visibility::Class, Some(10))));
    }
}
