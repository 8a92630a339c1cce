//! Device categorisation.
//!
//! The Snipe-IT category table is fixed, and the heuristics mapping a device
//! onto it are an ordered list of [`CategoryRule`]s where the first match wins.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::device::DeviceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Student,
    Staff,
    Ssc,
    CheckinIpad,
    DonationsIpad,
    MonerisIpad,
    TeacherIpad,
    AppleTv,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Student,
        Category::Staff,
        Category::Ssc,
        Category::CheckinIpad,
        Category::DonationsIpad,
        Category::MonerisIpad,
        Category::TeacherIpad,
        Category::AppleTv,
    ];

    /// Snipe-IT category id.
    pub fn id(self) -> u64 {
        match self {
            Category::Student => 12,
            Category::Staff => 16,
            Category::Ssc => 13,
            Category::CheckinIpad => 20,
            Category::DonationsIpad => 19,
            Category::MonerisIpad => 21,
            Category::TeacherIpad => 15,
            Category::AppleTv => 11,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Student => "Student Loaner Laptop",
            Category::Staff => "Staff Mac Laptop",
            Category::Ssc => "SSC Laptop",
            Category::CheckinIpad => "Check-In iPad",
            Category::DonationsIpad => "Donations iPad",
            Category::MonerisIpad => "Moneris iPad",
            Category::TeacherIpad => "Teacher iPad",
            Category::AppleTv => "Apple TVs",
        }
    }

    /// Appended to the hardware model to form the Snipe-IT model name, so the
    /// same hardware in two categories becomes two models.
    pub fn model_suffix(self) -> &'static str {
        match self {
            Category::Student => "Student",
            Category::Staff => "Staff",
            Category::Ssc => "SSC",
            Category::CheckinIpad => "CheckIn",
            Category::DonationsIpad => "Donations",
            Category::MonerisIpad => "Moneris",
            Category::TeacherIpad => "Teacher",
            Category::AppleTv => "AppleTV",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Category::Student => "student",
            Category::Staff => "staff",
            Category::Ssc => "ssc",
            Category::CheckinIpad => "checkin_ipad",
            Category::DonationsIpad => "donations_ipad",
            Category::MonerisIpad => "moneris_ipad",
            Category::TeacherIpad => "teacher_ipad",
            Category::AppleTv => "appletv",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which field of the device a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Prestage,
    Model,
    Email,
    DeviceName,
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub tag: &'static str,
    pub signal: Signal,
    /// Lower-case substrings; any one of them matching is enough.
    pub needles: &'static [&'static str],
    pub category: Category,
}

pub const RULES: &[CategoryRule] = &[
    CategoryRule {
        tag: "prestage:teacher-ipad",
        signal: Signal::Prestage,
        needles: &["staff ipads", "teacher ipad"],
        category: Category::TeacherIpad,
    },
    CategoryRule {
        tag: "prestage:checkin-ipad",
        signal: Signal::Prestage,
        needles: &["kiosk ipad", "check-in"],
        category: Category::CheckinIpad,
    },
    CategoryRule {
        tag: "prestage:donations-ipad",
        signal: Signal::Prestage,
        needles: &["donation"],
        category: Category::DonationsIpad,
    },
    CategoryRule {
        tag: "prestage:moneris-ipad",
        signal: Signal::Prestage,
        needles: &["moneris"],
        category: Category::MonerisIpad,
    },
    CategoryRule {
        tag: "prestage:appletv",
        signal: Signal::Prestage,
        needles: &["apple tv", "appletv"],
        category: Category::AppleTv,
    },
    CategoryRule {
        tag: "prestage:student",
        signal: Signal::Prestage,
        needles: &["student", "loaner"],
        category: Category::Student,
    },
    CategoryRule {
        tag: "prestage:ssc",
        signal: Signal::Prestage,
        needles: &["ssc"],
        category: Category::Ssc,
    },
    CategoryRule {
        tag: "prestage:staff",
        signal: Signal::Prestage,
        needles: &["staff", "employee"],
        category: Category::Staff,
    },
    CategoryRule {
        tag: "model:appletv",
        signal: Signal::Model,
        needles: &["apple tv", "appletv"],
        category: Category::AppleTv,
    },
    CategoryRule {
        tag: "model:ipad",
        signal: Signal::Model,
        needles: &["ipad"],
        category: Category::TeacherIpad,
    },
    CategoryRule {
        tag: "email:student",
        signal: Signal::Email,
        needles: &["@student.", "@students."],
        category: Category::Student,
    },
    CategoryRule {
        tag: "name:student",
        signal: Signal::DeviceName,
        needles: &["student", "loaner", "loan", "it-"],
        category: Category::Student,
    },
    CategoryRule {
        tag: "name:ssc",
        signal: Signal::DeviceName,
        needles: &["ssc"],
        category: Category::Ssc,
    },
];

pub const DEFAULT_CATEGORY: Category = Category::Staff;

/// Result of [`classify_explained`]. `rule` is `None` when nothing matched and
/// the default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub rule: Option<&'static str>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Signals<'a> {
    pub prestage_name: Option<&'a str>,
    pub device_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub model: Option<&'a str>,
}

impl<'a> Signals<'a> {
    pub fn from_record(record: &'a DeviceRecord) -> Self {
        Self {
            prestage_name: record.prestage_name.as_deref(),
            device_name: Some(record.name.as_str()),
            email: record.email.as_deref(),
            model: Some(record.model.as_str()),
        }
    }

    fn get(&self, signal: Signal) -> Option<&'a str> {
        match signal {
            Signal::Prestage => self.prestage_name,
            Signal::Model => self.model,
            Signal::Email => self.email,
            Signal::DeviceName => self.device_name,
        }
    }
}

pub fn classify_explained(signals: Signals<'_>) -> Classification {
    for rule in RULES {
        let Some(value) = signals.get(rule.signal) else {
            continue;
        };
        let haystack = value.to_lowercase();
        if rule.needles.iter().any(|needle| haystack.contains(needle)) {
            return Classification {
                category: rule.category,
                rule: Some(rule.tag),
            };
        }
    }
    Classification {
        category: DEFAULT_CATEGORY,
        rule: None,
    }
}

/// Total over its inputs: anything unmatched lands in [`DEFAULT_CATEGORY`].
pub fn classify(
    prestage_name: Option<&str>,
    device_name: Option<&str>,
    email: Option<&str>,
    model: Option<&str>,
) -> Category {
    classify_explained(Signals {
        prestage_name,
        device_name,
        email,
        model,
    })
    .category
}

pub fn classify_record(record: &DeviceRecord) -> Classification {
    let classification = classify_explained(Signals::from_record(record));
    debug!(
        serial = %record.serial,
        category = classification.category.key(),
        rule = classification.rule.unwrap_or("default"),
        "classified device"
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn student_prestage_wins_over_every_other_signal() {
        for prestage in ["Student Macs", "STUDENT LOANERS 2024", "new student"] {
            assert_eq!(
                classify(
                    Some(prestage),
                    Some("SSC-Front-Desk"),
                    Some("teacher@school.org"),
                    Some("iPad Pro")
                ),
                Category::Student
            );
        }
    }

    #[test]
    fn empty_inputs_default_to_staff() {
        assert_eq!(classify(None, None, None, None), Category::Staff);
        assert_eq!(classify(Some(""), Some(""), Some(""), Some("")), Category::Staff);
        assert_eq!(
            classify_explained(Signals::default()),
            Classification {
                category: Category::Staff,
                rule: None
            }
        );
    }

    #[test]
    fn specific_ipad_prestages_come_before_generic_ones() {
        assert_eq!(classify(Some("Staff iPads"), None, None, None), Category::TeacherIpad);
        assert_eq!(classify(Some("Kiosk iPad"), None, None, None), Category::CheckinIpad);
        assert_eq!(classify(Some("Front Check-In"), None, None, None), Category::CheckinIpad);
        assert_eq!(classify(Some("Donation Desk"), None, None, None), Category::DonationsIpad);
        assert_eq!(classify(Some("Moneris Terminals"), None, None, None), Category::MonerisIpad);
        assert_eq!(classify(Some("Employee Macs"), None, None, None), Category::Staff);
        assert_eq!(classify(Some("SSC Staff"), None, None, None), Category::Ssc);
    }

    #[test]
    fn falls_through_model_email_and_name() {
        let explained = classify_explained(Signals {
            model: Some("Apple TV 4K"),
            ..Signals::default()
        });
        assert_eq!(explained.rule, Some("model:appletv"));
        assert_eq!(explained.category, Category::AppleTv);

        assert_eq!(classify(None, None, None, Some("iPad (9th gen)")), Category::TeacherIpad);
        assert_eq!(
            classify(None, None, Some("j.doe@students.school.org"), Some("MacBook Air")),
            Category::Student
        );
        assert_eq!(classify(None, Some("IT-LOAN-07"), None, None), Category::Student);
        assert_eq!(classify(None, Some("ssc-mac-2"), None, None), Category::Ssc);
    }

    #[test]
    fn category_table_is_consistent() {
        let ids: std::collections::BTreeSet<u64> =
            Category::ALL.iter().map(|category| category.id()).collect();
        assert_eq!(ids.len(), Category::ALL.len());
        assert_eq!(Category::AppleTv.model_suffix(), "AppleTV");
    }
}
