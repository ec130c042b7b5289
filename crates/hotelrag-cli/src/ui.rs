//! UI utilities for the chat terminal

use colored::*;
use crossterm::terminal::size;
use std::io::{self, Write};

use hotelrag_core::{ResponseChunk, Result};

const BANNER_WIDTH: usize = 67;

/// Banner box lines, uncolored, for a terminal `terminal_width` columns wide.
pub(crate) fn banner_lines(
    terminal_width: usize,
    embedding_model: &str,
    generation_model: &str,
    store: &str,
) -> Vec<String> {
    let width = BANNER_WIDTH.min(terminal_width.saturating_sub(4)).max(8);
    let inner = width - 2;

    let content = [
        "HotelRAG - Tokyo Hotel & Airbnb Chatbot".to_string(),
        String::new(),
        format!("Embeddings: {}", embedding_model),
        format!("Answers:    {}", generation_model),
        format!("Listings:   {}", store),
        String::new(),
        "Type 'exit' to quit, 'clear' to forget the conversation".to_string(),
    ];

    let mut lines = vec![format!("┌{}┐", "─".repeat(inner)), format!("│{}│", " ".repeat(inner))];
    for line in content {
        let text: String = line.chars().take(inner - 3).collect();
        let pad = inner - 2 - text.chars().count();
        lines.push(format!("│  {}{}│", text, " ".repeat(pad)));
    }
    lines.push(format!("│{}│", " ".repeat(inner)));
    lines.push(format!("└{}┘", "─".repeat(inner)));
    lines
}

/// Display startup banner naming the models in use
pub fn display_banner(embedding_model: &str, generation_model: &str, store: &str) {
    let terminal_width = size().map(|(w, _)| w as usize).unwrap_or(80);

    println!();
    for (i, line) in banner_lines(terminal_width, embedding_model, generation_model, store)
        .into_iter()
        .enumerate()
    {
        if i == 2 {
            println!("{}", line.blue().bold());
        } else {
            println!("{}", line.blue());
        }
    }
    println!();
    println!(
        "{}",
        "Tip: ask e.g. 'hotel in shinjuku with dryer and washer'".dimmed()
    );
    println!();
}

/// Terminal rendering of a chunk. Status lines lose their trailing blank line.
pub fn chunk_line(chunk: &ResponseChunk) -> String {
    match chunk {
        ResponseChunk::Status(stage) => stage.message().trim_end().dimmed().to_string(),
        ResponseChunk::Text(text) => text.clone(),
        ResponseChunk::Notice(text) => text.yellow().to_string(),
        ResponseChunk::Error(text) => text.red().to_string(),
    }
}

/// Print a chunk as it arrives. Text chunks continue the current line.
pub fn print_chunk(chunk: &ResponseChunk) -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", chunk_text(chunk))?;
    stdout.flush()?;
    Ok(())
}

/// A chunk with the line breaks that surround it on the terminal.
pub(crate) fn chunk_text(chunk: &ResponseChunk) -> String {
    if chunk.is_status() {
        return format!("{}\n", chunk_line(chunk));
    }
    match chunk {
        ResponseChunk::Text(_) => chunk_line(chunk),
        ResponseChunk::Error(_) => format!("\n{}\n", chunk_line(chunk)),
        _ => format!("{}\n", chunk_line(chunk)),
    }
}

/// Print the listing references an answer was grounded on.
pub fn print_references(references: &[String]) {
    if references.is_empty() {
        return;
    }
    println!();
    println!("{}", "Listings:".bold());
    for reference in references {
        println!("  {} {}", "•".cyan(), reference);
    }
}

/// Show the input prompt.
pub fn prompt_line() -> Result<()> {
    print!("{} ", "hotel>".green().bold());
    io::stdout().flush()?;
    Ok(())
}
