use serde::Serialize;

/// Field descriptor served by `GET /schema`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Fields of the listing endpoints, in export order.
pub const SUBSCRIBER_COLUMNS: [Column; 6] = [
    Column {
        name: "email",
        kind: "string",
    },
    Column {
        name: "source",
        kind: "string",
    },
    Column {
        name: "user_agent",
        kind: "string",
    },
    Column {
        name: "job_id",
        kind: "string",
    },
    Column {
        name: "subscribed_at",
        kind: "timestamp",
    },
    Column {
        name: "unsubscribed_at",
        kind: "timestamp",
    },
];

pub fn column_names() -> impl Iterator<Item = &'static str> {
    SUBSCRIBER_COLUMNS.iter().map(|column| column.name)
}
