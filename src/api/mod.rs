pub(crate) mod auth;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod questions;
pub(crate) mod router;
pub(crate) mod subjects;
pub(crate) mod submissions;
pub(crate) mod users;
