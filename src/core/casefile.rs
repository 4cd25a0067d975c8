//! The user-supplied dispute case file.
//!
//! Case files are produced and mutated by the intake collaborator; the
//! engine treats them as a read-only snapshot. Completeness is derived,
//! never stored: `intake_complete` holds exactly when
//! [`CaseFile::missing_required_fields`] is empty.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the dispute the user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    /// The tenant claiming return of (part of) the deposit.
    Tenant,
    /// The landlord defending deductions.
    Landlord,
}

impl fmt::Display for PartyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tenant => f.write_str("tenant"),
            Self::Landlord => f.write_str("landlord"),
        }
    }
}

/// Typed dispute issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// End-of-tenancy cleaning deductions.
    Cleaning,
    /// Damage beyond fair wear and tear.
    Damage,
    /// Deposit not protected in an authorised scheme (s.213/s.214).
    DepositProtection,
    /// Unpaid rent set against the deposit.
    RentArrears,
    /// Redecoration costs.
    Redecoration,
    /// Garden maintenance.
    Gardening,
    /// Missing inventory items.
    MissingItems,
    /// Unpaid utility or council-tax bills.
    UnpaidBills,
    /// Anything else. Unknown strings from external callers (or the
    /// model) deserialize here rather than failing the whole parse.
    #[serde(other)]
    Other,
}

impl IssueKind {
    /// Stable snake_case name used in queries and config keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cleaning => "cleaning",
            Self::Damage => "damage",
            Self::DepositProtection => "deposit_protection",
            Self::RentArrears => "rent_arrears",
            Self::Redecoration => "redecoration",
            Self::Gardening => "gardening",
            Self::MissingItems => "missing_items",
            Self::UnpaidBills => "unpaid_bills",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence item categories, used for the rerank evidence overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// Photographs or video.
    Photographs,
    /// Check-in inventory report.
    InventoryReport,
    /// Check-out report.
    CheckoutReport,
    /// The tenancy agreement itself.
    TenancyAgreement,
    /// Letters, emails, or messages between the parties.
    Correspondence,
    /// Receipts, invoices, or quotes.
    Receipts,
    /// Witness statements.
    WitnessStatement,
    /// Anything else.
    Other,
}

impl EvidenceKind {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photographs => "photographs",
            Self::InventoryReport => "inventory_report",
            Self::CheckoutReport => "checkout_report",
            Self::TenancyAgreement => "tenancy_agreement",
            Self::Correspondence => "correspondence",
            Self::Receipts => "receipts",
            Self::WitnessStatement => "witness_statement",
            Self::Other => "other",
        }
    }
}

/// The disputed property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Street address. Required for intake.
    pub address: Option<String>,
    /// Postcode (redacted before any indexing).
    pub postcode: Option<String>,
    /// Tribunal region covering the property, e.g. `LON`.
    pub region: Option<String>,
    /// Free-form property type ("2-bed flat").
    pub property_type: Option<String>,
}

/// Tenancy and deposit facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tenancy {
    /// Tenancy start date (ISO 8601). Required for intake.
    pub start_date: Option<String>,
    /// Tenancy end date (ISO 8601).
    pub end_date: Option<String>,
    /// Monthly rent in GBP.
    pub monthly_rent: Option<f64>,
    /// Deposit amount in GBP. Required for intake.
    pub deposit_amount: Option<f64>,
    /// Whether the deposit was protected in an authorised scheme.
    /// Required for intake (either answer satisfies the gate).
    pub deposit_protected: Option<bool>,
    /// Scheme name when protected (TDS, DPS, mydeposits).
    pub deposit_scheme: Option<String>,
}

/// One piece of evidence. Blob fetching belongs to the evidence
/// collaborator; the engine only ever sees extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Evidence category.
    pub kind: EvidenceKind,
    /// Short description from the user.
    pub description: String,
    /// Text extracted by the evidence collaborator, if any.
    pub extracted_text: Option<String>,
}

/// A per-issue monetary claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimedAmount {
    /// Issue this claim attaches to.
    pub issue: IssueKind,
    /// Claimed amount in GBP.
    pub amount: f64,
    /// Indices into the case file's evidence list.
    #[serde(default)]
    pub evidence_refs: Vec<usize>,
}

/// The five fields the completeness gate requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    /// `property.address`
    PropertyAddress,
    /// `tenancy.start_date`
    TenancyStartDate,
    /// `tenancy.deposit_amount`
    DepositAmount,
    /// At least one entry in `issues`.
    AtLeastOneIssue,
    /// `tenancy.deposit_protected`
    DepositProtectionStatus,
}

impl RequiredField {
    /// Stable snake_case name reported in gate refusals.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PropertyAddress => "property_address",
            Self::TenancyStartDate => "tenancy_start_date",
            Self::DepositAmount => "deposit_amount",
            Self::AtLeastOneIssue => "at_least_one_issue",
            Self::DepositProtectionStatus => "deposit_protection_status",
        }
    }

    /// All required fields, in reporting order.
    pub const ALL: [Self; 5] = [
        Self::PropertyAddress,
        Self::TenancyStartDate,
        Self::DepositAmount,
        Self::AtLeastOneIssue,
        Self::DepositProtectionStatus,
    ];
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user-supplied dispute, as handed over by the intake collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFile {
    /// Stable case id assigned by the intake collaborator.
    pub case_id: String,
    /// Which party the user is.
    pub user_role: PartyRole,
    /// The disputed property.
    #[serde(default)]
    pub property: Property,
    /// Tenancy and deposit facts.
    #[serde(default)]
    pub tenancy: Tenancy,
    /// Ordered dispute issues.
    #[serde(default)]
    pub issues: Vec<IssueKind>,
    /// Evidence items.
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    /// Per-issue monetary claims.
    #[serde(default)]
    pub claims: Vec<ClaimedAmount>,
    /// Free-text narrative from the user.
    pub narrative: Option<String>,
}

impl CaseFile {
    /// Required fields that are still absent, in reporting order.
    #[must_use]
    pub fn missing_required_fields(&self) -> Vec<RequiredField> {
        let mut missing = Vec::new();
        if !present(self.property.address.as_deref()) {
            missing.push(RequiredField::PropertyAddress);
        }
        if !present(self.tenancy.start_date.as_deref()) {
            missing.push(RequiredField::TenancyStartDate);
        }
        if self.tenancy.deposit_amount.is_none() {
            missing.push(RequiredField::DepositAmount);
        }
        if self.issues.is_empty() {
            missing.push(RequiredField::AtLeastOneIssue);
        }
        if self.tenancy.deposit_protected.is_none() {
            missing.push(RequiredField::DepositProtectionStatus);
        }
        missing
    }

    /// True iff all five required fields are present.
    #[must_use]
    pub fn intake_complete(&self) -> bool {
        self.missing_required_fields().is_empty()
    }

    /// Fraction of required fields present, in [0, 1].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn completeness_score(&self) -> f64 {
        let missing = self.missing_required_fields().len();
        (RequiredField::ALL.len() - missing) as f64 / RequiredField::ALL.len() as f64
    }

    /// Distinct evidence kinds present in the case file.
    #[must_use]
    pub fn evidence_kinds(&self) -> Vec<EvidenceKind> {
        let mut kinds: Vec<EvidenceKind> = self.evidence.iter().map(|e| e.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_case() -> CaseFile {
        CaseFile {
            case_id: "case-001".to_string(),
            user_role: PartyRole::Tenant,
            property: Property {
                address: Some("12 Example Road, London".to_string()),
                postcode: None,
                region: Some("LON".to_string()),
                property_type: Some("flat".to_string()),
            },
            tenancy: Tenancy {
                start_date: Some("2023-01-15".to_string()),
                end_date: Some("2024-01-14".to_string()),
                monthly_rent: Some(1200.0),
                deposit_amount: Some(1500.0),
                deposit_protected: Some(false),
                deposit_scheme: None,
            },
            issues: vec![IssueKind::Cleaning],
            evidence: vec![EvidenceItem {
                kind: EvidenceKind::Photographs,
                description: "photos of the kitchen at checkout".to_string(),
                extracted_text: None,
            }],
            claims: vec![ClaimedAmount {
                issue: IssueKind::Cleaning,
                amount: 250.0,
                evidence_refs: vec![0],
            }],
            narrative: Some("The landlord kept the whole deposit.".to_string()),
        }
    }

    #[test]
    fn test_complete_case_has_no_missing_fields() {
        let case = complete_case();
        assert!(case.missing_required_fields().is_empty());
        assert!(case.intake_complete());
        assert!((case.completeness_score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_address() {
        let mut case = complete_case();
        case.property.address = None;
        assert_eq!(
            case.missing_required_fields(),
            vec![RequiredField::PropertyAddress]
        );
        assert!(!case.intake_complete());
    }

    #[test]
    fn test_blank_address_counts_as_missing() {
        let mut case = complete_case();
        case.property.address = Some("   ".to_string());
        assert!(!case.intake_complete());
    }

    #[test]
    fn test_intake_complete_iff_no_missing() {
        // The invariant holds by construction; exercise both sides anyway.
        let mut case = complete_case();
        assert_eq!(case.intake_complete(), case.missing_required_fields().is_empty());

        case.issues.clear();
        case.tenancy.deposit_protected = None;
        assert_eq!(
            case.missing_required_fields(),
            vec![
                RequiredField::AtLeastOneIssue,
                RequiredField::DepositProtectionStatus
            ]
        );
        assert_eq!(case.intake_complete(), case.missing_required_fields().is_empty());
    }

    #[test]
    fn test_completeness_score_partial() {
        let mut case = complete_case();
        case.property.address = None;
        case.tenancy.deposit_amount = None;
        assert!((case.completeness_score() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_deposit_protected_false_satisfies_gate() {
        // "Not protected" is an answer; only an unknown status blocks.
        let mut case = complete_case();
        case.tenancy.deposit_protected = Some(false);
        assert!(case.intake_complete());
    }

    #[test]
    fn test_evidence_kinds_deduped() {
        let mut case = complete_case();
        case.evidence.push(EvidenceItem {
            kind: EvidenceKind::Photographs,
            description: "more photos".to_string(),
            extracted_text: None,
        });
        case.evidence.push(EvidenceItem {
            kind: EvidenceKind::InventoryReport,
            description: "check-in inventory".to_string(),
            extracted_text: Some("inventory listing".to_string()),
        });
        assert_eq!(
            case.evidence_kinds(),
            vec![EvidenceKind::Photographs, EvidenceKind::InventoryReport]
        );
    }

    #[test]
    fn test_case_file_deserializes_with_defaults() {
        let json = r#"{"case_id":"c1","user_role":"landlord"}"#;
        let case: CaseFile = serde_json::from_str(json).unwrap();
        assert_eq!(case.user_role, PartyRole::Landlord);
        assert!(case.issues.is_empty());
        assert_eq!(case.missing_required_fields().len(), 5);
    }
}
