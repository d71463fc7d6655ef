use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;
use crate::utils::{month_name, short_month_name};

/// Declares a status-like enum stored as lowercase text, with `as_str`,
/// `Display` and a case-insensitive `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lc = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lc)
                    .ok_or_else(|| {
                        AppError::Validation(format!("unknown {} '{}'", stringify!($name), s))
                    })
            }
        }
    };
}

text_enum!(
    /// Membership lifecycle. Only `Pending` members can be approved or rejected.
    MemberStatus {
        Active => "active",
        Inactive => "inactive",
        Pending => "pending",
    }
);

text_enum!(Role {
    Member => "member",
    Admin => "admin",
});

text_enum!(
    /// `Overdue` is assigned explicitly, never derived from the due date.
    BillStatus {
        Pending => "pending",
        Paid => "paid",
        Overdue => "overdue",
    }
);

text_enum!(PaymentMethod {
    Online => "online",
    Cash => "cash",
    Manual => "manual",
});

text_enum!(ExpenseCategory {
    Electricity => "electricity",
    Security => "security",
    Water => "water",
    Maintenance => "maintenance",
    Cleaning => "cleaning",
    Garbage => "garbage",
    Staff => "staff",
    Other => "other",
});

impl ExpenseCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ExpenseCategory::Electricity => "Electricity",
            ExpenseCategory::Security => "Security",
            ExpenseCategory::Water => "Water",
            ExpenseCategory::Maintenance => "Maintenance",
            ExpenseCategory::Cleaning => "Cleaning",
            ExpenseCategory::Garbage => "Garbage Collection",
            ExpenseCategory::Staff => "Staff Salary",
            ExpenseCategory::Other => "Other",
        }
    }
}

text_enum!(NoticeType {
    Maintenance => "maintenance",
    Meeting => "meeting",
    Announcement => "announcement",
    Emergency => "emergency",
});

text_enum!(Priority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(NoticeStatus {
    Active => "active",
    Archived => "archived",
});

/// A (month, year) pair. Months are 1-based.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub const MIN_YEAR: i32 = 2000;
    pub const MAX_YEAR: i32 = 2100;
    pub const DUE_DAY: u32 = 15;

    pub fn new(month: u32, year: i32) -> Result<Self, AppError> {
        if !(1..=12).contains(&month) {
            return Err(AppError::Validation(format!(
                "month must be between 1 and 12, got {}",
                month
            )));
        }
        Self::check_year(year)?;
        Ok(BillingPeriod { year, month })
    }

    pub fn check_year(year: i32) -> Result<(), AppError> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(AppError::Validation(format!(
                "year must be between {} and {}, got {}",
                Self::MIN_YEAR,
                Self::MAX_YEAR,
                year
            )));
        }
        Ok(())
    }

    pub fn containing(date: NaiveDate) -> Self {
        BillingPeriod {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            BillingPeriod {
                year: self.year - 1,
                month: 12,
            }
        } else {
            BillingPeriod {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn due_date(&self) -> NaiveDate {
        // month is validated on construction and day 15 exists in every month
        NaiveDate::from_ymd_opt(self.year, self.month, Self::DUE_DAY).unwrap_or_default()
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    pub fn short_name(&self) -> &'static str {
        short_month_name(self.month)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub flat_number: String,
    pub phone: String,
    pub address: Option<String>,
    pub monthly_amount: Decimal,
    pub join_date: NaiveDate,
    pub status: MemberStatus,
    pub role: Role,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub member_id: String,
    pub month: u32,
    pub year: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub receipt_number: Option<String>,
}

impl Bill {
    /// Deterministic identifier; one bill per member per period.
    pub fn bill_id(member_id: &str, period: BillingPeriod) -> String {
        format!("{}-{}-{}", member_id, period.year, period.month)
    }

    pub fn period(&self) -> BillingPeriod {
        BillingPeriod {
            year: self.year,
            month: self.month,
        }
    }

    pub fn in_period(&self, period: BillingPeriod) -> bool {
        self.year == period.year && self.month == period.month
    }

    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }

    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub vendor: String,
    pub receipt_url: Option<String>,
    pub approved_by: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: String,
    pub title: String,
    pub content: String,
    pub notice_type: NoticeType,
    pub priority: Priority,
    pub date: NaiveDate,
    pub status: NoticeStatus,
}
