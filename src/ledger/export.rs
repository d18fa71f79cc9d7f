use serde::Serialize;

use crate::models::Transaction;

const HEADER: [&str; 8] = [
    "id",
    "date",
    "type",
    "category",
    "subType",
    "amount",
    "comment",
    "studentCount",
];

#[derive(Serialize)]
struct Row<'a> {
    id: &'a str,
    date: &'a str,
    kind: &'static str,
    category: &'a str,
    sub_type: Option<&'a str>,
    amount: f64,
    comment: &'a str,
    student_count: Option<i32>,
}

/// Writes the ledger as CSV. The header is present even for an empty ledger.
pub fn to_csv(ledger: &[Transaction]) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(HEADER)?;

    for t in ledger {
        wtr.serialize(Row {
            id: &t.id,
            date: &t.date,
            kind: t.kind.as_str(),
            category: &t.category,
            sub_type: t.sub_type.as_deref(),
            amount: t.amount,
            comment: &t.comment,
            student_count: t.student_count,
        })?;
    }

    Ok(wtr.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;

    #[test]
    fn quotes_commas_and_leaves_missing_blank() {
        let ledger = vec![Transaction {
            id: "entry-3".to_string(),
            date: "2024-01-07".to_string(),
            kind: TransactionType::Expense,
            category: "Fuel".to_string(),
            sub_type: None,
            amount: 3000.0,
            comment: "Litres: 20, Montant: 3000".to_string(),
            student_count: None,
        }];

        let out = String::from_utf8(to_csv(&ledger).unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("id,date,type,category,subType,amount,comment,studentCount")
        );
        assert_eq!(
            lines.next(),
            Some("entry-3,2024-01-07,EXPENSE,Fuel,,3000.0,\"Litres: 20, Montant: 3000\",")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn empty_ledger_has_header_only() {
        let out = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(out, "id,date,type,category,subType,amount,comment,studentCount\n");
    }
}
