//! In-memory stand-in for the Jira markup the flow is written against.
//!
//! Used by `waypoint demo` and the integration tests. It reproduces the awkward
//! parts: a split email/password login, a More trigger that input simulation
//! cannot reach, a menu that only renders after More is clicked, and a status
//! option that is plain text instead of a checkbox.

use std::time::Duration;

use cdp_adapter::{Effect, Route, ScriptedElement, ScriptedSite};
use url::Url;

pub const DEMO_BASE_URL: &str = "https://demo.atlassian.net";
pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo-password";

#[derive(Debug, Clone, Copy, Default)]
pub struct SiteOptions {
    /// The browsing profile already holds a session; the site skips the login page.
    pub signed_in: bool,
    /// Submitting credentials lands back on the login page.
    pub reject_login: bool,
}

pub fn jira_site(base_url: &str, options: SiteOptions) -> ScriptedSite {
    let base = base_url.trim_end_matches('/');
    let home = format!("{}/jira/your-work", base);
    let after_login = if options.reject_login {
        format!("{}/login", base)
    } else {
        home.clone()
    };
    let landing = if options.signed_in {
        home
    } else {
        format!("{}/login", base)
    };

    ScriptedSite::new()
        .route(login_route(after_login))
        .route(your_work_route(base))
        .route(issues_route())
        .route(Route::new(host_of(base)).redirect_to(landing))
}

fn login_route(after_login: String) -> Route {
    Route::new("/login")
        .element(
            ScriptedElement::new("email")
                .test_id("username")
                .css(r#"input[type="email"]"#),
        )
        .element(
            ScriptedElement::new("continue")
                .role("button")
                .name("Continue")
                .on_activate(Effect::Show("password".to_string()))
                .on_activate(Effect::Show("login-submit".to_string()))
                .on_activate(Effect::Detach("continue".to_string())),
        )
        .element(
            ScriptedElement::new("password")
                .css(r#"input[type="password"]"#)
                .hidden(),
        )
        .element(
            ScriptedElement::new("login-submit")
                .role("button")
                .name("Log in")
                .hidden()
                .on_activate(Effect::Navigate(after_login)),
        )
}

fn your_work_route(base: &str) -> Route {
    Route::new("/jira/your-work")
        .load_delay(Duration::from_millis(300))
        .element(ScriptedElement::new("sidebar").role("navigation"))
        .element(
            ScriptedElement::new("more")
                .test_id("sidebar-more-nav-menu-button-trigger")
                .role("button")
                .name("More")
                .child_of("sidebar")
                .unreachable()
                .on_activate(Effect::Show("filters".to_string())),
        )
        .element(
            ScriptedElement::new("filters")
                .role("menuitem")
                .name("Filters")
                .child_of("sidebar")
                .hidden()
                .on_activate(Effect::Navigate(format!("{}/issues/?filter=all", base))),
        )
}

fn issues_route() -> Route {
    let reveal = |id: &str| Effect::Show(id.to_string());
    Route::new("/issues")
        .load_delay(Duration::from_millis(200))
        .element(
            ScriptedElement::new("search")
                .placeholder("Search work items")
                .css(r#"input[type="search"]"#),
        )
        .element(
            ScriptedElement::new("status")
                .role("button")
                .name("Status")
                .on_activate(reveal("status-done"))
                .on_activate(reveal("status-in-progress"))
                .on_activate(reveal("status-to-do")),
        )
        .element(
            ScriptedElement::new("status-done")
                .role("checkbox")
                .name("Done")
                .checkbox(false)
                .hidden(),
        )
        .element(
            ScriptedElement::new("status-in-progress")
                .role("checkbox")
                .name("In Progress")
                .checkbox(true)
                .hidden(),
        )
        .element(ScriptedElement::new("status-to-do").text("To Do").hidden())
}

fn host_of(base: &str) -> String {
    let parsed = match Url::parse(base) {
        Ok(url) => url,
        Err(_) => return base.to_string(),
    };
    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => base.to_string(),
    }
}
