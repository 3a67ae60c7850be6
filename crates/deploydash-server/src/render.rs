//! Server-rendered pages. Every dashboard render is a full page; the embedded
//! `dashboard.js` reloads it on the refresh interval.

use deploydash_core::branches::BranchListing;
use deploydash_core::runner::{RunSummary, Script};
use deploydash_core::settings::REFRESH_INTERVAL;
use std::fmt::Write as _;

use crate::state::{Notice, NoticeLevel};

pub const TITLE: &str = "Deploy Dashboard";

/// Everything one dashboard render shows.
pub struct DashboardView<'a> {
    pub display_name: &'a str,
    pub branches: &'a BranchListing,
    pub running: Option<&'a RunSummary>,
    pub notices: &'a [Notice],
    pub build_log: &'a str,
    pub app_log: &'a str,
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn level_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "notice info",
        NoticeLevel::Success => "notice success",
        NoticeLevel::Warning => "notice warning",
        NoticeLevel::Error => "notice error",
    }
}

fn notice_html(out: &mut String, notice: &Notice) {
    let _ = write!(
        out,
        r#"<div class="{}">{}</div>"#,
        level_class(notice.level),
        escape(&notice.message)
    );
}

fn page(head_extra: &str, body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\">",
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
            "<title>{title}</title>",
            "<link rel=\"stylesheet\" href=\"/assets/style.css\">",
            "{head}</head><body>{body}</body></html>"
        ),
        title = TITLE,
        head = head_extra,
        body = body,
    )
}

pub fn login_page(notice: Option<&Notice>) -> String {
    let mut body = String::new();
    let _ = write!(body, r#"<main class="login"><h1>{TITLE}</h1>"#);
    if let Some(n) = notice {
        notice_html(&mut body, n);
    }
    body.push_str(concat!(
        r#"<form method="post" action="/login">"#,
        r#"<label>Username<input name="username" autocomplete="username" autofocus></label>"#,
        r#"<label>Password<input name="password" type="password" autocomplete="current-password"></label>"#,
        r#"<button type="submit">Login</button>"#,
        "</form></main>",
    ));
    page("", &body)
}

fn action_button(out: &mut String, script: Script, label: &str, disabled: &str) {
    let _ = write!(
        out,
        r#"<form method="post" action="/actions/{action}"><button type="submit" class="wide"{disabled}>{label}</button></form>"#,
        action = script.as_str(),
    );
}

pub fn dashboard_page(view: &DashboardView<'_>) -> String {
    let running = view.running.is_some();
    let disabled = if running { " disabled" } else { "" };
    let mut body = String::new();

    // Sidebar: identity, branch picker and actions.
    body.push_str(r#"<aside class="sidebar">"#);
    let _ = write!(body, "<h2>{TITLE}</h2>");
    notice_html(
        &mut body,
        &Notice::new(
            NoticeLevel::Success,
            format!("Welcome {}", view.display_name),
        ),
    );
    body.push_str(
        r#"<form method="post" action="/logout"><button type="submit">Logout</button></form>"#,
    );
    if let Some(err) = &view.branches.error {
        notice_html(
            &mut body,
            &Notice::new(
                NoticeLevel::Error,
                format!("Failed to load GitHub branches: {err}"),
            ),
        );
    }

    let _ = write!(
        body,
        r#"<label for="branch">Branch</label><select id="branch" name="branch" form="deploy-form"{disabled}>"#
    );
    for branch in &view.branches.branches {
        let b = escape(branch);
        let _ = write!(body, r#"<option value="{b}">{b}</option>"#);
    }
    body.push_str("</select><hr>");

    let _ = write!(
        body,
        r#"<form id="deploy-form" method="post" action="/actions/deploy"><button type="submit" class="wide"{disabled}>Deploy</button></form>"#
    );
    action_button(&mut body, Script::Stop, "Stop server", disabled);
    action_button(&mut body, Script::Restart, "Restart", disabled);
    body.push_str("</aside>");

    // Main: status, notices, log panes.
    body.push_str(r#"<main class="content"><header class="topbar"><h1>Live logs</h1>"#);
    body.push_str(
        r#"<form method="post" action="/actions/update"><button type="submit">Update deploy tooling</button></form></header>"#,
    );

    for notice in view.notices {
        notice_html(&mut body, notice);
    }

    match view.running {
        Some(run) => {
            let branch = run
                .branch
                .as_deref()
                .map(|b| format!(" on <code>{}</code>", escape(b)))
                .unwrap_or_default();
            let _ = write!(
                body,
                r#"<p class="status running">Running <code>{}</code>{branch} since {}</p>"#,
                run.script,
                run.started_at.format("%H:%M:%S UTC"),
            );
        }
        None => body.push_str(r#"<p class="status idle">Idle</p>"#),
    }

    let _ = write!(
        body,
        r#"<h3>Build log</h3><pre class="log" id="build-log">{}</pre>"#,
        escape(view.build_log)
    );
    let _ = write!(
        body,
        r#"<h3>Application log</h3><pre class="log" id="app-log">{}</pre>"#,
        escape(view.app_log)
    );
    body.push_str("</main>");

    let secs = REFRESH_INTERVAL.as_secs();
    let head = format!(
        concat!(
            "<script src=\"/assets/dashboard.js\" data-refresh-ms=\"{ms}\" defer></script>",
            "<noscript><meta http-equiv=\"refresh\" content=\"{secs}\"></noscript>"
        ),
        ms = REFRESH_INTERVAL.as_millis(),
        secs = secs,
    );
    page(&head, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn listing(branches: &[&str], error: Option<&str>) -> BranchListing {
        BranchListing {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            error: error.map(String::from),
        }
    }

    fn view<'a>(branches: &'a BranchListing, running: Option<&'a RunSummary>) -> DashboardView<'a> {
        DashboardView {
            display_name: "John",
            branches,
            running,
            notices: &[],
            build_log: "building <app>",
            app_log: "started",
        }
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn login_page_shows_notice() {
        let html = login_page(Some(&Notice::new(
            NoticeLevel::Error,
            "Username/password is incorrect",
        )));
        assert!(html.contains("Username/password is incorrect"));
        assert!(html.contains(r#"action="/login""#));
    }

    #[test]
    fn idle_dashboard_enables_controls() {
        let branches = listing(&["main", "dev"], None);
        let html = dashboard_page(&view(&branches, None));
        assert!(html.contains("Welcome John"));
        assert!(html.contains(r#"<option value="dev">dev</option>"#));
        assert!(!html.contains(" disabled"));
        assert!(html.contains("Idle"));
        assert!(html.contains("building &lt;app&gt;"));
        assert!(html.contains(r#"content="3""#));
    }

    #[test]
    fn running_dashboard_disables_controls() {
        let branches = listing(&["main"], None);
        let run = RunSummary {
            script: Script::Deploy,
            branch: Some("feature/x".into()),
            started_at: Utc::now(),
            pid: Some(42),
        };
        let html = dashboard_page(&view(&branches, Some(&run)));
        // Branch select plus three action buttons.
        assert_eq!(html.matches(" disabled").count(), 4);
        assert!(html.contains("Running <code>deploy.sh</code> on <code>feature/x</code>"));
    }

    #[test]
    fn branch_failure_is_shown() {
        let branches = listing(&["main"], Some("HTTP 500"));
        let html = dashboard_page(&view(&branches, None));
        assert!(html.contains("Failed to load GitHub branches: HTTP 500"));
    }
}
