use std::sync::OnceLock;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use tui_banner::Banner;

use orca_core::types::Panel;
use orca_nav::{GraphPanel, ListPanel, LoadState, LogPanel};

use crate::app::App;

/// Cached banner, rendered once since it never changes.
struct BannerCache {
    lines: Vec<String>,
    /// Widest line in the banner (character count).
    width: u16,
    /// Number of lines.
    height: u16,
}

fn cached_banner() -> &'static BannerCache {
    static CACHE: OnceLock<BannerCache> = OnceLock::new();
    CACHE.get_or_init(|| {
        let text = Banner::new("ORCA")
            .map(|b| b.style(tui_banner::Style::NeonCyber).render())
            .unwrap_or_else(|_| String::from("ORCA"));
        let lines: Vec<String> = text.lines().map(|l| l.to_string()).collect();
        let width = lines
            .iter()
            .map(|l| l.chars().count() as u16)
            .max()
            .unwrap_or(4);
        let height = lines.len() as u16;
        BannerCache {
            lines,
            width,
            height,
        }
    })
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Draw the TUI layout.
pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let banner = cached_banner();

    // Panels need about 16 rows to be useful; the art only shows when it
    // leaves them that much.
    let min_body_rows: u16 = 16;
    let banner_height = if area.height < min_body_rows + 6 {
        0
    } else if area.width >= banner.width + 2 && area.height >= banner.height + 1 + min_body_rows + 4 {
        banner.height + 1
    } else {
        2
    };

    let mut constraints = Vec::new();
    if banner_height > 0 {
        constraints.push(Constraint::Length(banner_height));
    }
    constraints.extend([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
    ]);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if banner_height > 0 {
        draw_banner(f, chunks[0], banner_height);
        next = 1;
    }
    draw_address_bar(f, app, chunks[next]);
    draw_body(f, app, chunks[next + 1]);
    draw_status_bar(f, app, chunks[next + 2]);
}

fn draw_banner(f: &mut Frame, area: Rect, banner_height: u16) {
    let banner = cached_banner();

    let lines: Vec<Line> = if banner_height > 2 && area.width >= banner.width {
        banner
            .lines
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan))))
            .collect()
    } else {
        vec![Line::from(vec![
            Span::styled(
                " ORCA",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  workflow runs and logs", Style::default().fg(Color::DarkGray)),
        ])]
    };

    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::BOTTOM))
        .style(Style::default());

    f.render_widget(widget, area);
}

fn draw_address_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, title, style) = if app.input.editing {
        (
            app.input.buffer.clone(),
            " Go to (Enter to open, Esc to cancel) ",
            Style::default().fg(Color::Yellow),
        )
    } else {
        (app.token(), " Location ", Style::default().fg(Color::White))
    };

    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .style(style);
    f.render_widget(widget, area);

    if app.input.editing {
        let cursor_x = area.x + 1 + app.input.cursor as u16;
        let cursor_y = area.y + 1;
        f.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(2)), cursor_y));
    }
}

fn draw_body(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
        .split(area);

    let lists = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(columns[1]);

    let panels = app.controller.panels();
    draw_list(f, &panels.workflows, " Workflows ", app.focus, lists[0]);
    draw_list(f, &panels.runs, " Runs ", app.focus, lists[1]);
    draw_list(f, &panels.tasks, " Task logs ", app.focus, lists[2]);
    draw_graph(f, &panels.graph, right[0]);
    draw_log(f, &panels.log, app.focus == Panel::Log, right[1]);
}

fn title(base: &str, state: LoadState, error: Option<&str>) -> String {
    let base = base.trim_end();
    match (state, error) {
        (LoadState::Loading, _) => format!("{} … ", base),
        (_, Some(_)) => format!("{} [!] ", base),
        _ => format!("{} ", base),
    }
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

fn draw_list(f: &mut Frame, list: &ListPanel, name: &str, focus: Panel, area: Rect) {
    let focused = list.panel() == focus;
    let lines: Vec<Line> = list
        .items()
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let style = if i == list.cursor() && focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else if i == list.cursor() {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(Span::styled(item.label.clone(), style))
        })
        .collect();

    // Keep the cursor row on screen
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = list.cursor().saturating_sub(visible.saturating_sub(1));

    let widget = Paragraph::new(lines)
        .block(panel_block(title(name, list.state(), list.error()), focused))
        .scroll((scroll as u16, 0));
    f.render_widget(widget, area);
}

fn draw_graph(f: &mut Frame, graph: &GraphPanel, area: Rect) {
    let model = graph.model();
    let mut lines: Vec<Line> = Vec::new();

    for node in &model.nodes {
        lines.push(Line::from(vec![
            Span::styled(
                node.id.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", node.desc), Style::default().fg(Color::DarkGray)),
        ]));
        for child in model.children_of(&node.id) {
            lines.push(Line::from(Span::raw(format!("  └─▶ {}", child))));
        }
    }

    let roots: Vec<&str> = model.roots().iter().map(|n| n.id.as_str()).collect();
    let name = if roots.is_empty() {
        " Graph ".to_string()
    } else {
        format!(" Graph (start: {}) ", roots.join(", "))
    };

    let widget = Paragraph::new(lines)
        .block(panel_block(title(&name, graph.state(), graph.error()), false))
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}

fn draw_log(f: &mut Frame, log: &LogPanel, focused: bool, area: Rect) {
    // Shown verbatim: no markup interpretation
    let lines: Vec<Line> = log.text().lines().map(|l| Line::from(l.to_string())).collect();

    let widget = Paragraph::new(lines)
        .block(panel_block(title(" Log ", log.state(), log.error()), focused))
        .wrap(Wrap { trim: false })
        .scroll((log.scroll(), 0));
    f.render_widget(widget, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let in_flight = app.controller.in_flight();
    let (text, style) = if in_flight > 0 {
        let idx = (app.tick_count / 2) % SPINNER.len();
        (
            format!(" {} Loading {} panel(s)...", SPINNER[idx], in_flight),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )
    } else if let Some(status) = &app.status {
        let bg = if status.is_error { Color::Red } else { Color::DarkGray };
        (
            format!(" {}", status.text),
            Style::default().bg(bg).fg(Color::White),
        )
    } else {
        (
            " Tab focus | Enter open | Backspace up | : go to | x execute | r refresh | q quit"
                .to_string(),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::*;
    use orca_core::event::EventBus;
    use orca_core::location::MemoryLocation;
    use orca_nav::{Controller, ExecutionTrigger, Navigator};
    use orca_test_utils::orders_backend;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn renders_every_panel() {
        let backend = Arc::new(orders_backend());
        let bus = Arc::new(EventBus::default());
        let token = "orders@2024-01-02T10-00-00@B.log";
        let navigator = Arc::new(Navigator::new(Arc::new(MemoryLocation::new(token)), bus.clone()));
        let mut controller = Controller::new(backend.clone(), bus.clone(), navigator.subscribe(), 10);
        controller.start();
        controller.settle().await.unwrap();
        let app = App::new(navigator, controller, ExecutionTrigger::new(backend, bus));

        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = screen(&terminal);

        assert!(text.contains(token));
        assert!(text.contains("billing.orca"));
        assert!(text.contains("B.log"));
        assert!(text.contains("B ran"));
        assert!(text.contains("└─▶ B"));
        assert!(text.contains("Graph (start: A)"));
    }

    #[test]
    fn title_marks_loading_and_errors() {
        assert_eq!(title(" Runs ", LoadState::Loading, None), " Runs … ");
        assert_eq!(title(" Runs ", LoadState::Ready, Some("x")), " Runs [!] ");
        assert_eq!(title(" Runs ", LoadState::Cleared, None), " Runs ");
    }
}
