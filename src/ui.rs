use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::io;

use crate::{
    error::ApiError,
    render::{format_priority, format_status},
    task::{Task, TaskForm, TaskStatus},
    task_list::{Flow, PageView, TaskListController},
};

const HELP: &str =
    "q quit | ←/→ column | ↑/↓ task | a add | e edit | enter advance | d delete | n/p page | r refresh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardExit {
    Quit,
    SignedOut,
}

#[derive(Debug, Default)]
pub struct BoardState {
    pub selected_column: usize,
    pub selected_task: usize,
    pub message: Option<String>,
}

/// One column per known status, plus "Other" when the server sent statuses
/// this client doesn't know.
pub fn columns(view: &PageView) -> Vec<(String, Vec<&Task>)> {
    let mut columns: Vec<(String, Vec<&Task>)> = TaskStatus::KNOWN
        .iter()
        .map(|status| {
            let tasks = view.tasks.iter().filter(|t| &t.status == status).collect();
            (format_status(status), tasks)
        })
        .collect();
    let other: Vec<&Task> = view
        .tasks
        .iter()
        .filter(|t| matches!(t.status, TaskStatus::Other(_)))
        .collect();
    if !other.is_empty() {
        columns.push(("Other".to_string(), other));
    }
    columns
}

impl BoardState {
    fn selected<'v>(&self, view: &'v PageView) -> Option<&'v Task> {
        columns(view)
            .get(self.selected_column)
            .and_then(|(_, tasks)| tasks.get(self.selected_task).copied())
    }

    fn clamp(&mut self, view: Option<&PageView>) {
        let Some(view) = view else {
            self.selected_column = 0;
            self.selected_task = 0;
            return;
        };
        let columns = columns(view);
        self.selected_column = self.selected_column.min(columns.len().saturating_sub(1));
        let len = columns
            .get(self.selected_column)
            .map_or(0, |(_, tasks)| tasks.len());
        self.selected_task = self.selected_task.min(len.saturating_sub(1));
    }
}

pub fn draw(f: &mut Frame, view: Option<&PageView>, state: &BoardState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    match view {
        Some(view) if view.empty_state().is_none() => draw_columns(f, rows[0], view, state),
        Some(view) => {
            let message = view.empty_state().map(|e| e.message()).unwrap_or_default();
            f.render_widget(
                Paragraph::new(message).block(Block::default().borders(Borders::ALL)),
                rows[0],
            );
        }
        None => f.render_widget(
            Paragraph::new("Loading...").block(Block::default().borders(Borders::ALL)),
            rows[0],
        ),
    }

    let status = match (view, &state.message) {
        (_, Some(message)) => Span::styled(message.clone(), Style::default().fg(Color::Red)),
        (Some(view), None) => {
            let mut text = format!("Page {}", view.page + 1);
            if !view.has_previous() {
                text.push_str(" (first)");
            }
            if !view.has_next() {
                text.push_str(" (last)");
            }
            Span::raw(text)
        }
        (None, None) => Span::raw(""),
    };
    f.render_widget(Paragraph::new(Line::from(status)), rows[1]);
    f.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        rows[2],
    );
}

fn draw_columns(f: &mut Frame, area: Rect, view: &PageView, state: &BoardState) {
    let columns = columns(view);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![
            Constraint::Ratio(1, columns.len() as u32);
            columns.len()
        ])
        .split(area);

    for (i, (title, tasks)) in columns.iter().enumerate() {
        let items: Vec<ListItem> = tasks
            .iter()
            .enumerate()
            .map(|(j, t)| {
                let style = if state.selected_column == i && state.selected_task == j {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("[#{}] ", t.id)),
                    Span::styled(t.title.as_str(), Style::default().fg(Color::White)),
                    Span::raw(format!(" ({})", format_priority(t.priority))),
                ]))
                .style(style)
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .title(title.as_str())
                .borders(Borders::ALL)
                .border_style(if state.selected_column == i {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                }),
        );
        f.render_widget(list, chunks[i]);
    }
}

/// Interactive board. Every change goes through the controller and is shown
/// only after the server has confirmed it.
pub async fn run_board<B: Backend>(
    terminal: &mut Terminal<B>,
    controller: &mut TaskListController<'_>,
) -> io::Result<BoardExit> {
    let mut state = BoardState::default();
    if let Some(exit) = apply(&mut state, controller.load_page(0).await) {
        return Ok(exit);
    }

    let mut prompted = false;
    loop {
        // Prompts print outside ratatui's buffer, so force a full repaint.
        if std::mem::take(&mut prompted) {
            terminal.clear()?;
        }
        state.clamp(controller.view());
        terminal.draw(|f| draw(f, controller.view(), &state))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        prompted = prompts(key.code);
        let column_count = controller.view().map_or(1, |v| columns(v).len());
        let outcome = match key.code {
            KeyCode::Char('q') => return Ok(BoardExit::Quit),
            KeyCode::Left => {
                state.selected_column = state.selected_column.saturating_sub(1);
                state.selected_task = 0;
                continue;
            }
            KeyCode::Right => {
                if state.selected_column + 1 < column_count {
                    state.selected_column += 1;
                    state.selected_task = 0;
                }
                continue;
            }
            KeyCode::Up => {
                state.selected_task = state.selected_task.saturating_sub(1);
                continue;
            }
            KeyCode::Down => {
                state.selected_task += 1;
                continue;
            }
            KeyCode::Char('n') => {
                if !controller.view().is_some_and(PageView::has_next) {
                    continue;
                }
                controller.next_page().await
            }
            KeyCode::Char('p') => controller.previous_page().await,
            KeyCode::Char('r') => controller.reload().await,
            KeyCode::Char('a') => {
                let Some(mut form) = prompt_form(&TaskForm::default()) else {
                    continue;
                };
                controller.create_task(&mut form).await
            }
            KeyCode::Char('e') => {
                let Some(task) = controller.view().and_then(|v| state.selected(v)).cloned() else {
                    continue;
                };
                let Some(form) = prompt_form(&TaskForm::from_task(&task)) else {
                    continue;
                };
                controller.update_task(task.id, &form).await
            }
            KeyCode::Enter => {
                let Some(task) = controller.view().and_then(|v| state.selected(v)).cloned() else {
                    continue;
                };
                let mut form = TaskForm::from_task(&task);
                form.status = advance(&task.status);
                controller.update_task(task.id, &form).await
            }
            KeyCode::Char('d') => {
                let Some(id) = controller
                    .view()
                    .and_then(|v| state.selected(v))
                    .map(|t| t.id)
                else {
                    continue;
                };
                controller
                    .delete_task(id, &mut |message: &str| {
                        prompt(&format!("{message} [y/N]"))
                            .is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
                    })
                    .await
            }
            _ => continue,
        };
        if let Some(exit) = apply(&mut state, outcome) {
            return Ok(exit);
        }
    }
}

/// Keys whose action asks questions on the terminal.
fn prompts(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('a' | 'e' | 'd'))
}

fn apply(state: &mut BoardState, outcome: Result<Flow, ApiError>) -> Option<BoardExit> {
    match outcome {
        Ok(Flow::SignedOut) => Some(BoardExit::SignedOut),
        Ok(_) => {
            state.message = None;
            None
        }
        Err(err) => {
            state.message = Some(err.to_string());
            None
        }
    }
}

/// Next status along pending -> in progress -> completed.
pub fn advance(status: &TaskStatus) -> TaskStatus {
    match status {
        TaskStatus::Pending => TaskStatus::InProgress,
        TaskStatus::InProgress | TaskStatus::Completed => TaskStatus::Completed,
        TaskStatus::Other(_) => TaskStatus::Pending,
    }
}

fn prompt_form(current: &TaskForm) -> Option<TaskForm> {
    let keep = |answer: String, old: &str| -> String {
        if answer.is_empty() {
            old.to_string()
        } else {
            answer
        }
    };
    let title = keep(prompt(&format!("Title [{}]", current.title))?, &current.title);
    let description = keep(
        prompt(&format!("Description [{}]", current.description))?,
        &current.description,
    );
    let priority = prompt(&format!("Priority (low/medium/high) [{}]", current.priority))?;
    let status = prompt(&format!(
        "Status (pending/in_progress/completed) [{}]",
        current.status
    ))?;
    Some(TaskForm {
        title,
        description,
        priority: priority.parse().unwrap_or(current.priority),
        status: status.parse().unwrap_or_else(|_| current.status.clone()),
    })
}

fn prompt(message: &str) -> Option<String> {
    disable_raw_mode().ok();
    println!("{}", message);
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input);
    enable_raw_mode().ok();
    read.ok().map(|_| input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskPriority;
    use chrono::Utc;
    use ratatui::backend::TestBackend;

    fn task(id: i64, title: &str, status: TaskStatus) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            status,
            priority: TaskPriority::Medium,
            created_at: Utc::now(),
        }
    }

    fn screen(view: Option<&PageView>, state: &BoardState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        terminal.draw(|f| draw(f, view, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn groups_tasks_by_status() {
        let view = PageView {
            page: 0,
            tasks: vec![
                task(1, "a", TaskStatus::Pending),
                task(2, "b", TaskStatus::Completed),
                task(3, "c", TaskStatus::Other("blocked".into())),
            ],
        };
        let columns = columns(&view);

        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["Pending", "In Progress", "Completed", "Other"]);
        assert_eq!(columns[2].1[0].id, 2);
        assert_eq!(columns[3].1[0].id, 3);
    }

    #[test]
    fn advance_moves_forward_and_stops_at_completed() {
        assert_eq!(advance(&TaskStatus::Pending), TaskStatus::InProgress);
        assert_eq!(advance(&TaskStatus::InProgress), TaskStatus::Completed);
        assert_eq!(advance(&TaskStatus::Completed), TaskStatus::Completed);
    }

    #[test]
    fn only_form_and_delete_keys_prompt() {
        assert!(prompts(KeyCode::Char('a')));
        assert!(prompts(KeyCode::Char('e')));
        assert!(prompts(KeyCode::Char('d')));
        assert!(!prompts(KeyCode::Enter));
        assert!(!prompts(KeyCode::Char('n')));
        assert!(!prompts(KeyCode::Left));
    }

    #[test]
    fn clear_then_draw_repaints_the_whole_board() {
        let view = PageView {
            page: 0,
            tasks: vec![task(1, "Buy milk", TaskStatus::Pending)],
        };
        let state = BoardState::default();
        let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
        terminal.draw(|f| draw(f, Some(&view), &state)).unwrap();

        terminal.clear().unwrap();
        terminal.draw(|f| draw(f, Some(&view), &state)).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("[#1] Buy milk (Medium)"));
    }

    #[test]
    fn draws_tasks_and_page_status() {
        let view = PageView {
            page: 0,
            tasks: vec![task(1, "Buy milk", TaskStatus::Pending)],
        };
        let text = screen(Some(&view), &BoardState::default());

        assert!(text.contains("[#1] Buy milk (Medium)"));
        assert!(text.contains("Page 1 (first) (last)"));
    }

    #[test]
    fn draws_empty_state_and_errors() {
        let view = PageView { page: 0, tasks: vec![] };
        let state = BoardState {
            message: Some("Task not found".to_string()),
            ..BoardState::default()
        };
        let text = screen(Some(&view), &state);

        assert!(text.contains("No tasks yet. Create one to get started!"));
        assert!(text.contains("Task not found"));
    }
}
