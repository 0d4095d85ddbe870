use serde::{Deserialize, Serialize};

/// Fields a raw header or JSON key can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    MachineNumber,
    MachineName,
    CreditDifference,
    GameCount,
    Bb,
    Rb,
    Synthesis,
    PayoutRate,
    BbRate,
    RbRate,
    WinRate,
    /// Site-internal link id; only ever read from JSON keys or row anchors.
    MachineId,
}

/// How the raw text of a field is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Percent,
    /// `wins/total` or `NN%`.
    Ratio,
    Text,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 12] = [
        CanonicalField::MachineNumber,
        CanonicalField::MachineName,
        CanonicalField::CreditDifference,
        CanonicalField::GameCount,
        CanonicalField::Bb,
        CanonicalField::Rb,
        CanonicalField::Synthesis,
        CanonicalField::PayoutRate,
        CanonicalField::BbRate,
        CanonicalField::RbRate,
        CanonicalField::WinRate,
        CanonicalField::MachineId,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::MachineNumber => "machine_number",
            CanonicalField::MachineName => "machine_name",
            CanonicalField::CreditDifference => "credit_difference",
            CanonicalField::GameCount => "game_count",
            CanonicalField::Bb => "bb",
            CanonicalField::Rb => "rb",
            CanonicalField::Synthesis => "synthesis",
            CanonicalField::PayoutRate => "payout_rate",
            CanonicalField::BbRate => "bb_rate",
            CanonicalField::RbRate => "rb_rate",
            CanonicalField::WinRate => "win_rate",
            CanonicalField::MachineId => "machine_id",
        }
    }

    #[must_use]
    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::MachineNumber
            | CanonicalField::CreditDifference
            | CanonicalField::GameCount
            | CanonicalField::Bb
            | CanonicalField::Rb => FieldKind::Integer,
            CanonicalField::PayoutRate => FieldKind::Percent,
            CanonicalField::WinRate => FieldKind::Ratio,
            CanonicalField::MachineName
            | CanonicalField::Synthesis
            | CanonicalField::BbRate
            | CanonicalField::RbRate
            | CanonicalField::MachineId => FieldKind::Text,
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
