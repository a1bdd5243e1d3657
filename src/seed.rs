// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! First-run administrator account and the optional demo school.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    access::{Audience, ClassId, InvalidTarget, Visibility},
    auth::{password::hash_password, Role},
    config::SeedAdmin,
    state::AppState,
    storage::{
        AnnouncementRecord, AnnouncementRepository, ExamRecord, ExamRepository, MarkRecord,
        MarkRepository, ProfileRecord, ProfileRepository, StorageError, StoredUser,
        StudentRecord, StudentRepository, TeacherRecord, TeacherRepository, TimetableRepository,
        TimetableSlot, UserRepository,
    },
};

/// Password shared by every demo account.
pub const DEMO_PASSWORD: &str = "password123";

const DEMO_EXAM: &str = "Mid-Term";

struct DemoTeacher {
    name: &'static str,
    email: &'static str,
    registration_id: &'static str,
    subject: &'static str,
    bio: &'static str,
}

struct DemoStudent {
    name: &'static str,
    email: &'static str,
    registration_id: &'static str,
    class: i64,
    /// Mathematics and Physics scores with remarks.
    scores: [(u8, &'static str); 2],
}

const DEMO_TEACHERS: [DemoTeacher; 2] = [
    DemoTeacher {
        name: "John Smith",
        email: "john.smith@school.test",
        registration_id: "TCH001",
        subject: "Mathematics",
        bio: "Mathematics teacher with 10 years of experience",
    },
    DemoTeacher {
        name: "Sarah Johnson",
        email: "sarah.johnson@school.test",
        registration_id: "TCH002",
        subject: "Physics",
        bio: "Science teacher specializing in Physics",
    },
];

const DEMO_STUDENTS: [DemoStudent; 3] = [
    DemoStudent {
        name: "Alice Brown",
        email: "alice.brown@school.test",
        registration_id: "STU001",
        class: 10,
        scores: [(85, "Excellent performance"), (78, "Good work")],
    },
    DemoStudent {
        name: "Bob Wilson",
        email: "bob.wilson@school.test",
        registration_id: "STU002",
        class: 10,
        scores: [(92, "Outstanding!"), (88, "Very good")],
    },
    DemoStudent {
        name: "Emma Davis",
        email: "emma.davis@school.test",
        registration_id: "STU003",
        class: 11,
        scores: [(90, "Excellent"), (82, "Well done")],
    },
];

type DemoDay = (&'static str, &'static [(&'static str, &'static str, &'static str)]);

const CLASS_10_WEEK: &[DemoDay] = &[
    (
        "Monday",
        &[
            ("09:00 - 10:00", "Mathematics", "TCH001"),
            ("10:00 - 11:00", "Physics", "TCH002"),
            ("11:30 - 12:30", "English", "TCH001"),
        ],
    ),
    (
        "Tuesday",
        &[
            ("09:00 - 10:00", "Chemistry", "TCH002"),
            ("10:00 - 11:00", "Mathematics", "TCH001"),
        ],
    ),
    (
        "Wednesday",
        &[
            ("09:00 - 10:00", "Physics", "TCH002"),
            ("10:00 - 11:00", "Mathematics", "TCH001"),
        ],
    ),
];

const CLASS_11_WEEK: &[DemoDay] = &[
    (
        "Monday",
        &[
            ("09:00 - 10:00", "Mathematics", "TCH001"),
            ("10:00 - 11:00", "Physics", "TCH002"),
        ],
    ),
    (
        "Tuesday",
        &[
            ("09:00 - 10:00", "Chemistry", "TCH002"),
            ("10:00 - 11:00", "Mathematics", "TCH001"),
        ],
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to hash seed password: {0}")]
    Hash(String),
    #[error("invalid demo data: {0}")]
    Invalid(#[from] InvalidTarget),
}

/// Create the configured administrator when the store has no accounts yet.
///
/// Returns the new account, or `None` when nothing was seeded.
pub fn seed_admin(state: &AppState) -> Result<Option<StoredUser>, SeedError> {
    let Some(seed) = state.config.seed_admin.as_ref() else {
        return Ok(None);
    };

    let users = UserRepository::new(state.storage(), state.index());
    if users.count()? > 0 {
        tracing::debug!("Accounts exist, skipping admin seed");
        return Ok(None);
    }

    let admin = create_admin(state, seed)?;
    tracing::info!(user_id = %admin.id, email = %admin.email, "Seeded administrator account");
    Ok(Some(admin))
}

fn create_admin(state: &AppState, seed: &SeedAdmin) -> Result<StoredUser, SeedError> {
    let hash = hash_password(&seed.password).map_err(|e| SeedError::Hash(e.to_string()))?;
    let admin = StoredUser::new(&seed.name, &seed.email, hash, Role::Admin);

    UserRepository::new(state.storage(), state.index()).create(&admin)?;
    ProfileRepository::new(state.storage()).save(&ProfileRecord::new(&admin.id, None))?;
    Ok(admin)
}

/// Load a small demo school into an empty store: one admin, two teachers
/// covering classes 10 and 11, three students, their timetables, a few
/// announcements and mid-term marks. Every account uses [`DEMO_PASSWORD`].
///
/// Returns `false` when accounts already exist.
pub fn seed_demo(state: &AppState) -> Result<bool, SeedError> {
    let users = UserRepository::new(state.storage(), state.index());
    if users.count()? > 0 {
        tracing::info!("Accounts exist, skipping demo data");
        return Ok(false);
    }

    let hash = hash_password(DEMO_PASSWORD).map_err(|e| SeedError::Hash(e.to_string()))?;
    let admin = demo_account(state, "Admin User", "admin@school.test", &hash, Role::Admin, None, "System administrator")?;

    let both_classes: BTreeSet<ClassId> = [ClassId::new(10)?, ClassId::new(11)?].into();
    let teachers = TeacherRepository::new(state.storage(), state.index());
    let mut teacher_ids = Vec::with_capacity(DEMO_TEACHERS.len());
    for t in &DEMO_TEACHERS {
        let user = demo_account(state, t.name, t.email, &hash, Role::Teacher, Some(t.registration_id), t.bio)?;
        teachers.create(&TeacherRecord::new(&user.id, t.registration_id, t.subject, both_classes.clone()))?;
        teacher_ids.push(user.id);
    }

    let students = StudentRepository::new(state.storage(), state.index());
    let marks = MarkRepository::new(state.storage(), state.index());
    for s in &DEMO_STUDENTS {
        let class = ClassId::new(s.class)?;
        let user = demo_account(state, s.name, s.email, &hash, Role::Student, Some(s.registration_id), "")?;
        students.create(&StudentRecord::new(&user.id, s.registration_id, class))?;

        for ((teacher, teacher_id), (score, remarks)) in DEMO_TEACHERS.iter().zip(&teacher_ids).zip(s.scores) {
            let mut mark = MarkRecord::new(s.registration_id, class, teacher.subject, DEMO_EXAM, score, teacher_id.as_str());
            mark.remarks = remarks.to_string();
            marks.create(&mark)?;
        }
    }

    ExamRepository::new(state.storage(), state.index())
        .create(&ExamRecord::new(DEMO_EXAM, "Mid-term examinations", &admin.id))?;

    let timetables = TimetableRepository::new(state.storage());
    timetables.upsert(ClassId::new(10)?, demo_week(CLASS_10_WEEK))?;
    timetables.upsert(ClassId::new(11)?, demo_week(CLASS_11_WEEK))?;

    let announcements = AnnouncementRepository::new(state.storage());
    let notices = [
        (
            "Welcome to the New Academic Year",
            "We are excited to welcome all students and teachers to the new academic year.",
            Audience::new(Visibility::All, None)?,
            &admin.id,
        ),
        (
            "Mathematics Exam Schedule",
            "The mathematics mid-term exam will be held next Friday.",
            Audience::new(Visibility::Class, Some(10))?,
            &teacher_ids[0],
        ),
        (
            "Science Fair Registration",
            "Registration for the annual science fair is now open.",
            Audience::new(Visibility::Student, Some(10))?,
            &teacher_ids[1],
        ),
    ];
    for (title, description, audience, author) in notices {
        announcements.save(&AnnouncementRecord::new(title, description, audience, author.as_str()))?;
    }

    tracing::info!(
        teachers = DEMO_TEACHERS.len(),
        students = DEMO_STUDENTS.len(),
        "Seeded demo school"
    );
    Ok(true)
}

fn demo_account(
    state: &AppState,
    name: &str,
    email: &str,
    hash: &str,
    role: Role,
    registration_id: Option<&str>,
    bio: &str,
) -> Result<StoredUser, SeedError> {
    let user = StoredUser::new(name, email, hash.to_string(), role);
    UserRepository::new(state.storage(), state.index()).create(&user)?;

    let mut profile = ProfileRecord::new(&user.id, registration_id.map(str::to_string));
    profile.bio = bio.to_string();
    ProfileRepository::new(state.storage()).save(&profile)?;
    Ok(user)
}

fn demo_week(days: &[DemoDay]) -> BTreeMap<String, Vec<TimetableSlot>> {
    days.iter()
        .map(|(day, slots)| {
            let slots = slots
                .iter()
                .map(|(time, subject, teacher)| TimetableSlot {
                    time: time.to_string(),
                    subject: subject.to_string(),
                    teacher: teacher.to_string(),
                })
                .collect();
            (day.to_string(), slots)
        })
        .collect()
}
