use std::fmt::Write;

use ansi_term::{Colour, Style};
use anyhow::{bail, Result};
use serde::Deserialize;

use crate::{
    protocol::Response,
    timer::{stats::AggregatedStats, TimerBrief, TimerInfo, TimerState},
    utils::time::format_duration_ms,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum Printable {
    Timer(TimerInfo),
    SavedTimers(Vec<TimerBrief>),
    Stats(AggregatedStats),
}

/// Prints a successful response, a failure is turned into an error.
pub fn print_response(response: Response) -> Result<()> {
    println!("{}", render_response(response)?);
    Ok(())
}

fn render_response(response: Response) -> Result<String> {
    if !response.success {
        let message = response.message.unwrap_or_else(|| "Unknown failure".into());
        match response.code {
            Some(code) => bail!("{message} ({code})"),
            None => bail!("{message}"),
        }
    }

    let Some(data) = response.data else {
        return Ok(Colour::Green.paint("Done").to_string());
    };

    Ok(match serde_json::from_value::<Printable>(data.clone()) {
        Ok(Printable::Timer(info)) => render_timer(&info),
        Ok(Printable::SavedTimers(timers)) => render_saved_timers(&timers),
        Ok(Printable::Stats(stats)) => render_stats(&stats),
        Err(_) => serde_json::to_string_pretty(&data)?,
    })
}

fn state_style(state: TimerState) -> Style {
    match state {
        TimerState::Created => Colour::Blue.normal(),
        TimerState::Running => Colour::Green.bold(),
        TimerState::Paused => Colour::Yellow.normal(),
        TimerState::Ended => Colour::Red.normal(),
    }
}

fn render_timer(info: &TimerInfo) -> String {
    let state = serde_json::to_value(info.state)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();

    let mut text = format!(
        "{} [{}]\n",
        Style::new().bold().paint(&info.brief.name),
        state_style(info.state).paint(state)
    );
    if let Some(description) = &info.brief.description {
        let _ = writeln!(text, "{description}");
    }
    let _ = write!(
        text,
        "elapsed {} / remaining {} / total {}",
        format_duration_ms(info.elapsed_time),
        format_duration_ms(info.remaining_time),
        format_duration_ms(info.brief.duration),
    );
    text
}

fn render_saved_timers(timers: &[TimerBrief]) -> String {
    if timers.is_empty() {
        return "No saved timers".into();
    }
    timers
        .iter()
        .map(|timer| {
            let mut line = format!(
                "{} {}",
                Style::new().bold().paint(&timer.name),
                format_duration_ms(timer.duration)
            );
            if let Some(description) = &timer.description {
                let _ = write!(line, " {}", Colour::Fixed(245).paint(description));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_stats(stats: &AggregatedStats) -> String {
    let mut text = format!(
        "{} sessions, {} in total",
        stats.timer_count,
        Style::new().bold().paint(format_duration_ms(stats.total_duration_ms))
    );
    for (name, timer) in &stats.timers {
        let _ = write!(
            text,
            "\n  {name}: {} x{}",
            format_duration_ms(timer.total_duration_ms),
            timer.count
        );
    }
    text
}
