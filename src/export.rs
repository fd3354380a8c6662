use chrono::NaiveDate;

use crate::members::age_from_birthdate;
use crate::model::MemberRecord;
use crate::time::format_ms_date;

pub const MEMBER_CSV_HEADERS: [&str; 7] = [
    "Name",
    "Relation",
    "Birthdate",
    "Age",
    "Phone",
    "Notes",
    "Added",
];

/// Every field is quoted, even when it needs no escaping, so downstream
/// spreadsheet imports treat phone numbers as text instead of numerics.
fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| csv_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Renders the member list as CSV text, newest handling left to the caller
/// since rows keep the cache order. Age is derived against `today` and left
/// blank when no birthdate is on file.
pub fn members_to_csv(members: &[MemberRecord], today: NaiveDate) -> String {
    let header = csv_row(
        &MEMBER_CSV_HEADERS
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>(),
    );

    let mut lines = Vec::with_capacity(members.len() + 1);
    lines.push(header);

    for member in members {
        let birthdate = member
            .birthdate
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let age = member
            .birthdate
            .map(|date| age_from_birthdate(date, today).to_string())
            .unwrap_or_default();

        lines.push(csv_row(&[
            member.name.clone(),
            member.relation.clone(),
            birthdate,
            age,
            member.phone.clone().unwrap_or_default(),
            member.notes.clone().unwrap_or_default(),
            format_ms_date(member.created_at),
        ]));
    }

    lines.join("\n")
}
