use std::error::Error;

use crate::repo::UserExportRow;

pub const EXPORT_HEADERS: [&str; 8] = [
    "ID",
    "Имя",
    "Username",
    "Deeplink",
    "Покупка",
    "Premium",
    "Урок",
    "Дата захода",
];

const MISSING: &str = "—";

fn flag(value: bool) -> &'static str {
    if value {
        "✅"
    } else {
        "❌"
    }
}

fn record(row: &UserExportRow) -> [String; 8] {
    [
        row.id.to_string(),
        row.full_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| MISSING.to_string()),
        row.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| format!("@{}", name))
            .unwrap_or_else(|| MISSING.to_string()),
        row.deeplink
            .map(|id| id.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        flag(row.has_paid).to_string(),
        // premium is unknown for users created before it was tracked
        row.is_premium
            .map(|premium| flag(premium).to_string())
            .unwrap_or_else(|| "-".to_string()),
        row.lesson_number
            .map(|lesson| lesson.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        row.created_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| MISSING.to_string()),
    ]
}

pub fn write_users_csv(rows: &[UserExportRow]) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADERS)?;
    for row in rows {
        writer.write_record(record(row))?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    Ok(bytes)
}

pub fn export_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("users_{}.csv", now.format("%Y%m%d_%H%M%S"))
}
