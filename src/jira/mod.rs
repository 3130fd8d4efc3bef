//! Jira flow definition and its offline stand-in

pub mod flow;
pub mod site;

pub use flow::{build_flow, status_option_name, FLOW_NAME};
pub use site::{jira_site, SiteOptions, DEMO_BASE_URL, DEMO_EMAIL, DEMO_PASSWORD};
