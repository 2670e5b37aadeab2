pub mod ai_conversations;
pub mod attendance;
pub mod hr_documents;
pub mod leave_balances;
pub mod leave_types;
pub mod leaves;
pub mod salary_slips;
pub mod schema;
pub mod sessions;
pub mod users;
