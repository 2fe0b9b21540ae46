//! Turning a page of tasks into something a person can read.

use std::fmt::Write;

use crate::{
    task::{Task, TaskPriority, TaskStatus},
    task_list::PageView,
};

/// Escapes text for use inside HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `in_progress` -> `In Progress`
pub fn format_status(status: &TaskStatus) -> String {
    status
        .as_str()
        .split('_')
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_priority(priority: TaskPriority) -> String {
    capitalize_first(priority.as_str())
}

fn created_on(task: &Task) -> String {
    task.created_at.format("%Y-%m-%d").to_string()
}

/// Renders a page as an HTML fragment. All user-supplied text is escaped.
pub fn render_html(view: &PageView) -> String {
    if let Some(empty) = view.empty_state() {
        return format!(
            "<div class=\"empty-state\">\n  <p>{}</p>\n</div>\n",
            empty.message()
        );
    }

    let mut html = String::from("<div class=\"task-list\">\n");
    for task in &view.tasks {
        let _ = writeln!(
            html,
            "  <article class=\"task-card {priority}-priority\" data-task-id=\"{id}\">",
            priority = task.priority,
            id = task.id,
        );
        let _ = writeln!(html, "    <h5>{}</h5>", escape_html(&task.title));
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(html, "    <p>{}</p>", escape_html(description));
        }
        let _ = writeln!(
            html,
            "    <span class=\"badge status-{}\">{}</span>",
            escape_html(task.status.as_str()),
            escape_html(&format_status(&task.status)),
        );
        let _ = writeln!(
            html,
            "    <span class=\"badge priority-{}\">{}</span>",
            task.priority,
            format_priority(task.priority),
        );
        let _ = writeln!(html, "    <small>Created: {}</small>", created_on(task));
        html.push_str("  </article>\n");
    }
    html.push_str("</div>\n");

    if view.show_pagination() {
        let disabled = |off: bool| if off { " disabled" } else { "" };
        let _ = write!(
            html,
            "<nav class=\"pagination\">\n  \
             <button class=\"page-prev\"{}>Previous</button>\n  \
             <span class=\"page-current\">Page {}</span>\n  \
             <button class=\"page-next\"{}>Next</button>\n\
             </nav>\n",
            disabled(!view.has_previous()),
            view.page + 1,
            disabled(!view.has_next()),
        );
    }
    html
}

/// Drops control characters (escape sequences included) so server text can't
/// drive the terminal. Newlines are kept.
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\n' || !c.is_control())
        .collect()
}

/// Plain listing for the terminal.
pub fn render_text(view: &PageView) -> String {
    if let Some(empty) = view.empty_state() {
        return format!("{}\n", empty.message());
    }

    let mut out = String::new();
    for task in &view.tasks {
        let _ = writeln!(
            out,
            "[#{}] {} ({}, {}) created {}",
            task.id,
            strip_control(&task.title),
            strip_control(&format_status(&task.status)),
            format_priority(task.priority),
            created_on(task),
        );
        if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "      {}", strip_control(description));
        }
    }

    let mut nav = vec![format!("Page {}", view.page + 1)];
    if view.has_previous() {
        nav.push(format!("previous: --page {}", view.page - 1));
    }
    if view.has_next() {
        nav.push(format!("next: --page {}", view.page + 1));
    }
    let _ = writeln!(out, "-- {} --", nav.join(" | "));
    out
}
