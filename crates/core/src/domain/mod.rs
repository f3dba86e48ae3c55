pub mod activity;
pub mod cms;
pub mod draft;
pub mod quote;
pub mod role;
pub mod submission;
