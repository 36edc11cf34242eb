// src/main.rs — Activity Board (Rust + web-sys + WASM)
//
// Binds to the host page's signup widgets (#activities-list, #activity,
// #signup-form, #email, #message), fetches the activity catalog from the
// backend and wires up signup + participant removal.

use std::rc::Rc;

use gloo::timers::callback::Timeout;
use gloo_net::http::Request;
use serde::Deserialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    window, Document, Element, HtmlElement, HtmlFormElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement,
};

const ACTIVITIES_PATH: &str = "/activities";
const NOTICE_HIDE_MS: u32 = 5_000;

/* -----------------------------
   Config
----------------------------- */

/// Collapses the two upstream page variants: the public page hides the
/// trash-can buttons and skips the refresh after a signup, the management
/// page has both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BoardConfig {
    allow_participant_removal: bool,
    reload_after_signup: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            allow_participant_removal: true,
            reload_after_signup: true,
        }
    }
}

/* -----------------------------
   Dialogs (injectable, so the core stays testable off-browser)
----------------------------- */

trait Dialogs {
    fn confirm(&self, message: &str) -> bool;
    fn alert(&self, message: &str);
}

struct BrowserDialogs;

impl Dialogs for BrowserDialogs {
    fn confirm(&self, message: &str) -> bool {
        gloo::dialogs::confirm(message)
    }

    fn alert(&self, message: &str) {
        gloo::dialogs::alert(message);
    }
}

/* -----------------------------
   Wire types
----------------------------- */

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Activity {
    description: String,
    schedule: String,
    max_participants: i64,
    #[serde(default)]
    participants: Vec<String>,
}

/// Signed on purpose: the server may report more participants than the
/// maximum, and the page shows the negative number as-is.
fn spots_left(activity: &Activity) -> i64 {
    activity.max_participants - activity.participants.len() as i64
}

/// `/activities` answers an object keyed by activity name. serde_json's
/// `preserve_order` feature keeps the entries in server order.
fn parse_activities(body: Value) -> Result<Vec<(String, Activity)>, serde_json::Error> {
    let map: serde_json::Map<String, Value> = serde_json::from_value(body)?;
    map.into_iter()
        .map(|(name, details)| serde_json::from_value(details).map(|a| (name, a)))
        .collect()
}

/* -----------------------------
   Text helpers
----------------------------- */

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Split like the /[._-]+/ regex: runs of separators collapse, but a run at
/// either end still yields an empty segment.
fn split_local_part(s: &str) -> Vec<&str> {
    let is_sep = |c: char| matches!(c, '.' | '_' | '-');
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_sep = false;
    for (i, c) in s.char_indices() {
        if is_sep(c) {
            if !in_sep {
                segments.push(&s[start..i]);
                in_sep = true;
            }
        } else if in_sep {
            start = i;
            in_sep = false;
        }
    }
    if in_sep {
        segments.push("");
    } else {
        segments.push(&s[start..]);
    }
    segments
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Avatar initials from an email: first letter of each segment of the local
/// part, max two, uppercased.
fn initials(email: &str) -> String {
    if email.is_empty() {
        return "?".to_string();
    }
    let local = email.split('@').next().unwrap_or("");
    let segments: Vec<&str> = split_local_part(local)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return local.chars().take(2).collect::<String>().to_uppercase();
    }
    segments
        .iter()
        .filter_map(|s| s.chars().next())
        .take(2)
        .collect::<String>()
        .to_uppercase()
}

fn display_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let local = if local.is_empty() { "onbekend" } else { local };
    split_local_part(local)
        .into_iter()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/* -----------------------------
   Markup builders (pure, so they test without a DOM)
----------------------------- */

fn participant_item_html(activity: &str, email: &str, allow_removal: bool) -> String {
    let name = display_name(email);
    let avatar = initials(email);
    let delete_button = if allow_removal {
        format!(
            r#"<button class="delete-participant" title="Verwijder deelnemer" data-email="{email}" data-activity="{activity}" aria-label="Verwijder {name}">🗑️</button>"#,
            email = escape_html(email),
            activity = escape_html(activity),
            name = escape_html(&name),
        )
    } else {
        String::new()
    };
    format!(
        r#"<li class="participant-item"><span class="participant-avatar" aria-hidden="true">{avatar}</span><span class="participant-name">{name}</span>{delete_button}</li>"#,
        avatar = escape_html(&avatar),
        name = escape_html(&name),
    )
}

fn participants_html(activity: &str, details: &Activity, allow_removal: bool) -> String {
    if details.participants.is_empty() {
        return r#"<div class="participants" aria-label="Deelnemers"><h5>Deelnemers <span class="participant-count">0</span></h5><ul class="participant-list"></ul><div class="participants-empty">Nog geen deelnemers</div></div>"#.to_string();
    }
    let items: String = details
        .participants
        .iter()
        .map(|email| participant_item_html(activity, email, allow_removal))
        .collect();
    format!(
        r#"<div class="participants" aria-label="Deelnemers"><h5>Deelnemers <span class="participant-count">{count}</span></h5><ul class="participant-list">{items}</ul></div>"#,
        count = details.participants.len(),
    )
}

fn activity_card_html(name: &str, details: &Activity, allow_removal: bool) -> String {
    format!(
        r#"<div class="activity-card"><h4>{name}</h4><p>{description}</p><p><strong>Schedule:</strong> {schedule}</p><p><strong>Availability:</strong> {spots} spots left</p>{participants}</div>"#,
        name = escape_html(name),
        description = escape_html(&details.description),
        schedule = escape_html(&details.schedule),
        spots = spots_left(details),
        participants = participants_html(name, details, allow_removal),
    )
}

fn board_html(entries: &[(String, Activity)], allow_removal: bool) -> String {
    entries
        .iter()
        .map(|(name, details)| activity_card_html(name, details, allow_removal))
        .collect()
}

/* -----------------------------
   Backend calls
----------------------------- */

fn signup_url(activity: &str, email: &str) -> String {
    format!(
        "/activities/{}/signup?email={}",
        urlencoding::encode(activity),
        urlencoding::encode(email)
    )
}

fn unregister_url(activity: &str, email: &str) -> String {
    format!(
        "/activities/{}/unregister?email={}",
        urlencoding::encode(activity),
        urlencoding::encode(email)
    )
}

fn removal_prompt(email: &str, activity: &str) -> String {
    format!("Weet je zeker dat je {email} wilt verwijderen uit {activity}?")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SignupOutcome {
    Accepted(String),
    Rejected(String),
}

fn classify_signup(ok: bool, body: &Value) -> SignupOutcome {
    if ok {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        SignupOutcome::Accepted(message.to_string())
    } else {
        let detail = body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("An error occurred");
        SignupOutcome::Rejected(detail.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RemovalOutcome {
    Removed,
    Rejected(String),
}

fn classify_removal(ok: bool, body: &Value) -> RemovalOutcome {
    if ok {
        RemovalOutcome::Removed
    } else {
        let detail = body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("Kon deelnemer niet verwijderen.");
        RemovalOutcome::Rejected(detail.to_string())
    }
}

async fn fetch_activities() -> Result<Vec<(String, Activity)>, String> {
    let resp = Request::get(ACTIVITIES_PATH)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let body: Value = resp.json().await.map_err(|e| e.to_string())?;
    parse_activities(body).map_err(|e| e.to_string())
}

async fn post_signup(activity: &str, email: &str) -> Result<SignupOutcome, gloo_net::Error> {
    let resp = Request::post(&signup_url(activity, email)).send().await?;
    let body: Value = resp.json().await?;
    Ok(classify_signup(resp.ok(), &body))
}

async fn delete_participant(activity: &str, email: &str) -> Result<RemovalOutcome, gloo_net::Error> {
    let resp = Request::delete(&unregister_url(activity, email))
        .send()
        .await?;
    let body: Value = resp.json().await?;
    Ok(classify_removal(resp.ok(), &body))
}

/* -----------------------------
   The board
----------------------------- */

struct ActivityBoard {
    config: BoardConfig,
    dialogs: Rc<dyn Dialogs>,
    list: Element,
    picker: HtmlSelectElement,
    form: HtmlFormElement,
    email: HtmlInputElement,
    notice: HtmlElement,
}

impl ActivityBoard {
    /// Looks up the host page elements. The board never creates these; a
    /// missing or mistyped one aborts the whole mount.
    fn bind(
        doc: &Document,
        config: BoardConfig,
        dialogs: Rc<dyn Dialogs>,
    ) -> Result<Rc<Self>, String> {
        fn grab<T: JsCast>(doc: &Document, id: &str) -> Result<T, String> {
            doc.get_element_by_id(id)
                .ok_or_else(|| format!("missing element #{id}"))?
                .dyn_into::<T>()
                .map_err(|_| format!("element #{id} has an unexpected type"))
        }

        Ok(Rc::new(Self {
            config,
            dialogs,
            list: grab(doc, "activities-list")?,
            picker: grab(doc, "activity")?,
            form: grab(doc, "signup-form")?,
            email: grab(doc, "email")?,
            notice: grab(doc, "message")?,
        }))
    }

    fn install(self: &Rc<Self>) {
        // Signup form submit
        {
            let board = Rc::clone(self);
            let c = Closure::<dyn FnMut(web_sys::Event)>::new(move |e: web_sys::Event| {
                e.prevent_default();
                let email = board.email.value();
                let activity = board.picker.value();
                let board = Rc::clone(&board);
                spawn_local(async move { board.handle_signup(activity, email).await });
            });
            self.form
                .add_event_listener_with_callback("submit", c.as_ref().unchecked_ref())
                .unwrap();
            c.forget();
        }

        // One delegated click listener covers every trash-can button,
        // current and future: the list is re-rendered wholesale on each
        // reload, so per-button listeners would not survive.
        if self.config.allow_participant_removal {
            let board = Rc::clone(self);
            let c = Closure::<dyn FnMut(web_sys::Event)>::new(move |e: web_sys::Event| {
                let Some(target) = e.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                    return;
                };
                let Ok(Some(button)) = target.closest(".delete-participant") else {
                    return;
                };
                let (Some(email), Some(activity)) = (
                    button.get_attribute("data-email"),
                    button.get_attribute("data-activity"),
                ) else {
                    return;
                };
                if !board.dialogs.confirm(&removal_prompt(&email, &activity)) {
                    return;
                }
                let board = Rc::clone(&board);
                spawn_local(async move { board.handle_removal(activity, email).await });
            });
            self.list
                .add_event_listener_with_callback("click", c.as_ref().unchecked_ref())
                .unwrap();
            c.forget();
        }
    }

    async fn reload(&self) {
        match fetch_activities().await {
            Ok(entries) => self.render(&entries),
            Err(err) => {
                self.list
                    .set_inner_html("<p>Failed to load activities. Please try again later.</p>");
                gloo::console::error!(format!("Error fetching activities: {err}"));
            }
        }
    }

    fn render(&self, entries: &[(String, Activity)]) {
        self.list
            .set_inner_html(&board_html(entries, self.config.allow_participant_removal));
        self.rebuild_picker(entries);
    }

    /// Options are rebuilt on every reload rather than appended, otherwise
    /// each refresh would add a duplicate set. A leading placeholder option
    /// with an empty value belongs to the host page and is kept.
    fn rebuild_picker(&self, entries: &[(String, Activity)]) {
        let keep_placeholder = match self.picker.options().item(0) {
            Some(first) => first.unchecked_into::<HtmlOptionElement>().value().is_empty(),
            None => false,
        };
        self.picker.set_length(u32::from(keep_placeholder));

        let Some(doc) = self.picker.owner_document() else {
            return;
        };
        for (name, _) in entries {
            let Ok(el) = doc.create_element("option") else {
                continue;
            };
            let option: HtmlOptionElement = el.unchecked_into();
            option.set_value(name);
            option.set_text_content(Some(name.as_str()));
            let _ = self.picker.append_child(&option);
        }
    }

    async fn handle_signup(self: Rc<Self>, activity: String, email: String) {
        match post_signup(&activity, &email).await {
            Ok(SignupOutcome::Accepted(message)) => {
                self.show_notice(&message, "success");
                self.form.reset();
                if self.config.reload_after_signup {
                    self.reload().await;
                }
            }
            Ok(SignupOutcome::Rejected(detail)) => {
                self.show_notice(&detail, "error");
            }
            Err(err) => {
                self.show_notice("Failed to sign up. Please try again.", "error");
                gloo::console::error!(format!("Error signing up: {err}"));
            }
        }
    }

    async fn handle_removal(self: Rc<Self>, activity: String, email: String) {
        match delete_participant(&activity, &email).await {
            Ok(RemovalOutcome::Removed) => self.reload().await,
            Ok(RemovalOutcome::Rejected(detail)) => self.dialogs.alert(&detail),
            Err(err) => {
                self.dialogs.alert("Fout bij verwijderen deelnemer.");
                gloo::console::error!(format!("Error removing participant: {err}"));
            }
        }
    }

    /// Every notice starts its own hide timer. Timers from superseded
    /// notices still fire; hiding is idempotent so that is harmless.
    fn show_notice(&self, text: &str, kind: &str) {
        self.notice.set_text_content(Some(text));
        self.notice.set_class_name(kind);
        let _ = self.notice.class_list().remove_1("hidden");

        let notice = self.notice.clone();
        Timeout::new(NOTICE_HIDE_MS, move || {
            let _ = notice.class_list().add_1("hidden");
        })
        .forget();
    }
}

/* -----------------------------
   Entrypoints
----------------------------- */

#[wasm_bindgen(start)]
pub fn start() {
    let Some(doc) = window().and_then(|w| w.document()) else {
        return;
    };
    match ActivityBoard::bind(&doc, BoardConfig::default(), Rc::new(BrowserDialogs)) {
        Ok(board) => {
            board.install();
            let board = Rc::clone(&board);
            spawn_local(async move { board.reload().await });
        }
        Err(err) => gloo::console::error!(format!("Activity board not mounted: {err}")),
    }
}

// Bin crates still want a Rust main; wasm-bindgen calls `start()` on init.
fn main() {}

/* -----------------------------
   Tests
----------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(max: i64, participants: &[&str]) -> Activity {
        Activity {
            description: "desc".to_string(),
            schedule: "Mondays".to_string(),
            max_participants: max,
            participants: participants.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn escape_html_replaces_all_entities() {
        assert_eq!(
            escape_html(r#"<b class="x">Tom & 'Jerry'</b>"#),
            "&lt;b class=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn escape_html_leaves_clean_strings_alone() {
        assert_eq!(escape_html("Chess Club"), "Chess Club");
        assert_eq!(escape_html(&escape_html("Chess Club")), "Chess Club");
    }

    #[test]
    fn initials_take_two_segments() {
        assert_eq!(initials("jane.doe@x.com"), "JD");
        assert_eq!(initials("jane.mary.doe@x.com"), "JM");
        assert_eq!(initials("jane_doe-smith@x.com"), "JD");
    }

    #[test]
    fn initials_single_segment_falls_back_to_two_chars() {
        assert_eq!(initials("a@x.com"), "A");
        assert_eq!(initials("ab@x.com"), "AB");
    }

    #[test]
    fn initials_empty_email_is_question_mark() {
        assert_eq!(initials(""), "?");
    }

    #[test]
    fn initials_separator_only_local_part_keeps_first_two_chars() {
        // no usable segments: fall back to the raw start of the local part
        assert_eq!(initials("--@x.com"), "--");
    }

    #[test]
    fn initials_empty_local_part_is_empty() {
        assert_eq!(initials("@x.com"), "");
    }

    #[test]
    fn display_name_capitalizes_each_segment() {
        assert_eq!(display_name("jane_doe@x.com"), "Jane Doe");
        assert_eq!(display_name("jane.doe-smith@x.com"), "Jane Doe Smith");
        assert_eq!(display_name("bob@x.com"), "Bob");
    }

    #[test]
    fn display_name_empty_local_part_uses_placeholder() {
        assert_eq!(display_name("@x.com"), "Onbekend");
    }

    #[test]
    fn split_collapses_runs_but_keeps_edge_segments() {
        assert_eq!(split_local_part("a__b"), vec!["a", "b"]);
        assert_eq!(split_local_part("_a"), vec!["", "a"]);
        assert_eq!(split_local_part("a_"), vec!["a", ""]);
        assert_eq!(split_local_part(""), vec![""]);
    }

    #[test]
    fn spots_left_counts_down() {
        assert_eq!(spots_left(&activity(10, &["a", "b", "c"])), 7);
    }

    #[test]
    fn spots_left_goes_negative_when_overbooked() {
        assert_eq!(spots_left(&activity(2, &["a", "b", "c"])), -1);
    }

    #[test]
    fn parse_activities_preserves_response_order() {
        let body = json!({
            "Zeilen": {"description": "d1", "schedule": "s1", "max_participants": 5, "participants": []},
            "Atletiek": {"description": "d2", "schedule": "s2", "max_participants": 3, "participants": ["a@x.com"]},
            "Muziek": {"description": "d3", "schedule": "s3", "max_participants": 8, "participants": []},
        });
        let entries = parse_activities(body).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["Zeilen", "Atletiek", "Muziek"]);
        assert_eq!(entries[1].1.participants, ["a@x.com"]);
    }

    #[test]
    fn parse_activities_defaults_missing_participants() {
        let body = json!({
            "Chess": {"description": "d", "schedule": "s", "max_participants": 4},
        });
        let entries = parse_activities(body).unwrap();
        assert!(entries[0].1.participants.is_empty());
    }

    #[test]
    fn parse_activities_rejects_malformed_bodies() {
        assert!(parse_activities(json!([1, 2, 3])).is_err());
        assert!(parse_activities(json!({"Chess": {"description": "d"}})).is_err());
        assert!(parse_activities(
            json!({"Chess": {"description": "d", "schedule": "s", "max_participants": "lots"}})
        )
        .is_err());
    }

    #[test]
    fn board_html_renders_one_card_per_activity() {
        let entries = vec![
            (
                "Chess Club".to_string(),
                activity(12, &["jane.doe@x.com", "bob@x.com"]),
            ),
            ("Drama".to_string(), activity(20, &[])),
        ];
        let html = board_html(&entries, true);
        assert_eq!(html.matches(r#"class="activity-card""#).count(), 2);
        assert!(html.contains(r#"<span class="participant-count">2</span>"#));
        assert!(html.contains(r#"<span class="participant-count">0</span>"#));
        assert!(html.contains("10 spots left"));
        assert!(html.contains("20 spots left"));
    }

    #[test]
    fn board_html_empty_activity_shows_empty_state() {
        let entries = vec![("Drama".to_string(), activity(20, &[]))];
        let html = board_html(&entries, true);
        assert!(html.contains("Nog geen deelnemers"));
        assert!(!html.contains("participant-item"));
    }

    #[test]
    fn board_html_escapes_server_strings() {
        let mut hostile = activity(5, &[r#""quote"@x.com"#]);
        hostile.description = "<script>alert(1)</script>".to_string();
        hostile.schedule = "Mon & Tue".to_string();
        let entries = vec![("<img src=x>".to_string(), hostile)];
        let html = board_html(&entries, true);
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;img src=x&gt;"));
        assert!(html.contains("Mon &amp; Tue"));
        // a raw quote in the email must not terminate the data attribute
        assert!(html.contains(r#"data-email="&quot;quote&quot;@x.com""#));
    }

    #[test]
    fn board_html_hides_removal_buttons_when_disabled() {
        let entries = vec![("Chess".to_string(), activity(5, &["jane@x.com"]))];
        assert!(board_html(&entries, true).contains("delete-participant"));
        assert!(!board_html(&entries, false).contains("delete-participant"));
    }

    #[test]
    fn removal_buttons_carry_the_activity_name() {
        let entries = vec![("Chess Club".to_string(), activity(5, &["jane@x.com"]))];
        let html = board_html(&entries, true);
        assert!(html.contains(r#"data-activity="Chess Club""#));
        assert!(html.contains(r#"data-email="jane@x.com""#));
    }

    #[test]
    fn signup_url_percent_encodes_name_and_email() {
        assert_eq!(
            signup_url("PE & Sports", "a+b@x.com"),
            "/activities/PE%20%26%20Sports/signup?email=a%2Bb%40x.com"
        );
    }

    #[test]
    fn unregister_url_percent_encodes_name_and_email() {
        assert_eq!(
            unregister_url("Chess Club", "jane.doe@x.com"),
            "/activities/Chess%20Club/unregister?email=jane.doe%40x.com"
        );
    }

    #[test]
    fn removal_prompt_names_email_and_activity() {
        assert_eq!(
            removal_prompt("jane@x.com", "Chess"),
            "Weet je zeker dat je jane@x.com wilt verwijderen uit Chess?"
        );
    }

    #[test]
    fn signup_success_uses_server_message() {
        let outcome = classify_signup(true, &json!({"message": "Signed up!"}));
        assert_eq!(outcome, SignupOutcome::Accepted("Signed up!".to_string()));
    }

    #[test]
    fn signup_failure_uses_detail_with_fallback() {
        let outcome = classify_signup(false, &json!({"detail": "Already registered"}));
        assert_eq!(
            outcome,
            SignupOutcome::Rejected("Already registered".to_string())
        );

        let outcome = classify_signup(false, &json!({}));
        assert_eq!(
            outcome,
            SignupOutcome::Rejected("An error occurred".to_string())
        );
    }

    #[test]
    fn removal_failure_uses_detail_with_fallback() {
        assert_eq!(classify_removal(true, &json!({})), RemovalOutcome::Removed);
        assert_eq!(
            classify_removal(false, &json!({"detail": "Onbekende deelnemer"})),
            RemovalOutcome::Rejected("Onbekende deelnemer".to_string())
        );
        assert_eq!(
            classify_removal(false, &json!(null)),
            RemovalOutcome::Rejected("Kon deelnemer niet verwijderen.".to_string())
        );
    }

    #[test]
    fn default_config_is_the_management_variant() {
        let config = BoardConfig::default();
        assert!(config.allow_participant_removal);
        assert!(config.reload_after_signup);
    }
}
