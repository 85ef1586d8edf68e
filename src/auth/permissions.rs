use anyhow::Error;
use once_cell::sync::Lazy;
use rocket::serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnProfile,
    EditOwnProfile,
    PurchasePackages,
    RequestAppointments,
    ApplyAsCoach,

    ManageAvailability,
    ManageAppointments,
    ViewCoachedStudents,
    EditCoachProfile,

    ManagePackages,
    ReviewCoachApplications,
    ManageAllAppointments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Student,
    Coach,
    Admin,
}

static STUDENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);
    permissions.insert(Permission::PurchasePackages);
    permissions.insert(Permission::RequestAppointments);
    permissions.insert(Permission::ApplyAsCoach);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnProfile);
    permissions.insert(Permission::EditOwnProfile);

    permissions.insert(Permission::ManageAvailability);
    permissions.insert(Permission::ManageAppointments);
    permissions.insert(Permission::ViewCoachedStudents);
    permissions.insert(Permission::EditCoachProfile);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(COACH_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ManagePackages);
    permissions.insert(Permission::ReviewCoachApplications);
    permissions.insert(Permission::ManageAllAppointments);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Student => &STUDENT_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Coach => "coach",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "student" => Ok(Role::Student),
            "coach" => Ok(Role::Coach),
            "admin" => Ok(Role::Admin),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
