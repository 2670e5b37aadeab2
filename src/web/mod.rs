pub mod ai;
pub mod attendance;
pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod leaves;
pub mod salary;
