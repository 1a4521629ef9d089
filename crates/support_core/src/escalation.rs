/// Topics routed to a human: compensation, termination, legal, disciplinary.
pub const ESCALATION_KEYWORDS: &[&str] = &[
    "salary",
    "pay",
    "payroll",
    "termination",
    "fired",
    "dismiss",
    "legal",
    "lawsuit",
    "notice period",
    "resign",
    "disciplinary",
    "bonus",
    "ctc",
    "increment",
];

/// Case-insensitive substring test. Over-matching is accepted ("pay" also
/// hits "repayment"); the flag is advisory only.
pub fn is_escalation(query: &str) -> bool {
    let q = query.to_lowercase();
    ESCALATION_KEYWORDS.iter().any(|k| q.contains(k))
}
