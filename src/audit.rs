// 🔎 Ledger Audit - Surface records the queries tolerate but never attribute
//
// Malformed records are kept in the ledger on purpose (a blank winner still
// counts as a loss for both sides). The audit does not change any query
// result; it reports how much of the ledger falls into each odd case.

use crate::ledger::{BattleRecord, Ledger};
use crate::roster::Roster;
use serde::{Deserialize, Serialize};

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Participant missing
    Warning,  // Record counts toward totals but not toward wins
    Info,     // Record is valid but will be partly invisible to joins
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    MissingParticipant,
    MissingWinner,
    UnattributedWinner,
    SelfBattle,
    UnknownParticipant,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::MissingParticipant => Severity::Critical,
            IssueKind::MissingWinner | IssueKind::UnattributedWinner => Severity::Warning,
            IssueKind::SelfBattle | IssueKind::UnknownParticipant => Severity::Info,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            IssueKind::MissingParticipant => "participant id is blank",
            IssueKind::MissingWinner => "winner is blank; counted as a loss for both sides",
            IssueKind::UnattributedWinner => "winner matches neither participant; counted as a loss for both sides",
            IssueKind::SelfBattle => "both participants are the same pokemon",
            IssueKind::UnknownParticipant => "participant is not in the roster; dropped from joins",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditIssue {
    /// Position in the ledger (0-based)
    pub record_index: usize,
    pub kind: IssueKind,
    pub severity: Severity,
    pub record: BattleRecord,
}

// ============================================================================
// AUDIT REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditReport {
    pub total_records: usize,
    pub clean_records: usize,
    pub missing_participant: usize,
    pub missing_winner: usize,
    pub unattributed_winner: usize,
    pub self_battles: usize,
    pub unknown_participants: usize,
    /// First `sample_limit` issues, in ledger order
    pub samples: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn summary(&self) -> String {
        format!(
            "{} battles: {} clean | {} missing participant, {} missing winner, {} unattributed winner, {} self-battles, {} unknown participants",
            self.total_records,
            self.clean_records,
            self.missing_participant,
            self.missing_winner,
            self.unattributed_winner,
            self.self_battles,
            self.unknown_participants
        )
    }

    pub fn is_clean(&self) -> bool {
        self.clean_records == self.total_records
    }

    pub fn has_critical_issues(&self) -> bool {
        self.missing_participant > 0
    }

    /// Share of records with no issue, 0..=100 (100 for an empty ledger)
    pub fn clean_percentage(&self) -> f64 {
        if self.total_records == 0 {
            100.0
        } else {
            self.clean_records as f64 / self.total_records as f64 * 100.0
        }
    }

    fn count(&mut self, kind: IssueKind) {
        match kind {
            IssueKind::MissingParticipant => self.missing_participant += 1,
            IssueKind::MissingWinner => self.missing_winner += 1,
            IssueKind::UnattributedWinner => self.unattributed_winner += 1,
            IssueKind::SelfBattle => self.self_battles += 1,
            IssueKind::UnknownParticipant => self.unknown_participants += 1,
        }
    }
}

// ============================================================================
// LEDGER AUDITOR
// ============================================================================

pub struct LedgerAuditor {
    /// Maximum number of sample issues kept in the report
    pub sample_limit: usize,
}

impl LedgerAuditor {
    pub fn new() -> Self {
        LedgerAuditor { sample_limit: 20 }
    }

    pub fn with_sample_limit(sample_limit: usize) -> Self {
        LedgerAuditor { sample_limit }
    }

    /// Classify one record; a record can carry several issues
    pub fn inspect(&self, record: &BattleRecord, roster: &Roster) -> Vec<IssueKind> {
        let mut issues = Vec::new();

        if record.first.is_none() || record.second.is_none() {
            issues.push(IssueKind::MissingParticipant);
        }

        match &record.winner {
            None => issues.push(IssueKind::MissingWinner),
            Some(_) if !record.has_attributable_winner() => issues.push(IssueKind::UnattributedWinner),
            Some(_) => {}
        }

        if record.is_self_battle() {
            issues.push(IssueKind::SelfBattle);
        }

        // Empty roster means no roster was supplied; skip the join check
        if !roster.is_empty() {
            let unknown = [&record.first, &record.second]
                .into_iter()
                .flatten()
                .any(|id| !roster.contains(id));
            if unknown {
                issues.push(IssueKind::UnknownParticipant);
            }
        }

        issues
    }

    pub fn audit(&self, ledger: &Ledger, roster: &Roster) -> AuditReport {
        let mut report = AuditReport {
            total_records: ledger.len(),
            ..AuditReport::default()
        };

        for (record_index, record) in ledger.iter().enumerate() {
            let issues = self.inspect(record, roster);
            if issues.is_empty() {
                report.clean_records += 1;
                continue;
            }

            for kind in issues {
                report.count(kind);
                if report.samples.len() < self.sample_limit {
                    report.samples.push(AuditIssue {
                        record_index,
                        kind,
                        severity: kind.severity(),
                        record: record.clone(),
                    });
                }
            }
        }

        report
    }
}

impl Default for LedgerAuditor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
