use anyhow::Result;
use region::Region;
use row::{Column, Mutation, Row};
use std::io::{BufRead, Write};
use tracing::debug;

const PROMPT: &str = "> ";

/// Runs the REPL until `EXIT`/`QUIT` or end of input.
///
/// Command failures are reported as `ERR ...` lines and the loop goes on;
/// only failures to read input or write output end it with an error.
pub fn run<R: BufRead, W: Write>(region: &Region, input: R, mut output: W) -> Result<()> {
    write!(output, "{PROMPT}")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        if !execute(region, &line, &mut output)? {
            break;
        }
        write!(output, "{PROMPT}")?;
        output.flush()?;
    }
    Ok(())
}

/// Executes one command line. Returns `false` when the shell should stop.
pub fn execute<W: Write>(region: &Region, line: &str, out: &mut W) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(true);
    };
    debug!(command = cmd, "shell command");

    match cmd.to_uppercase().as_str() {
        "PUT" => {
            let (Some(row), Some(column)) = (parts.next(), parts.next()) else {
                writeln!(out, "ERR usage: PUT row family:qualifier value")?;
                return Ok(true);
            };
            let value = parts.collect::<Vec<&str>>().join(" ");
            let Some(column) = Column::parse(column) else {
                writeln!(out, "ERR column must be family:qualifier, got {column}")?;
                return Ok(true);
            };
            if value.is_empty() {
                writeln!(out, "ERR usage: PUT row family:qualifier value")?;
                return Ok(true);
            }
            let m = Mutation::new(row).with_column(column.family, column.qualifier, value);
            match region.put(m) {
                Ok(()) => writeln!(out, "OK")?,
                Err(e) => writeln!(out, "ERR put failed: {e}")?,
            }
        }
        "GET" => match parts.next() {
            Some(row) => match region.get(row.as_bytes()) {
                Ok(Some(r)) => writeln!(out, "{}", format_fields(&r))?,
                Ok(None) => writeln!(out, "(nil)")?,
                Err(e) => writeln!(out, "ERR read failed: {e}")?,
            },
            None => writeln!(out, "ERR usage: GET row")?,
        },
        "DEL" => match parts.next() {
            Some(row) => match region.delete(row.as_bytes()) {
                Ok(true) => writeln!(out, "OK")?,
                Ok(false) => writeln!(out, "OK (not in memtable)")?,
                Err(e) => writeln!(out, "ERR del failed: {e}")?,
            },
            None => writeln!(out, "ERR usage: DEL row")?,
        },
        "SCAN" => {
            let start = open_bound(parts.next());
            let stop = open_bound(parts.next());
            let limit = match parts.next().map(str::parse::<usize>) {
                None => usize::MAX,
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    writeln!(out, "ERR usage: SCAN [start] [stop] [limit]")?;
                    return Ok(true);
                }
            };
            let scanner = region.scan(start.as_bytes(), stop.as_bytes());
            let rows = scanner.next_batch(limit);
            scanner.close();
            if rows.is_empty() {
                writeln!(out, "(empty)")?;
            } else {
                for r in &rows {
                    writeln!(
                        out,
                        "{} -> {}",
                        String::from_utf8_lossy(r.key()),
                        format_fields(r)
                    )?;
                }
                writeln!(out, "({} rows)", rows.len())?;
            }
        }
        "FLUSH" => match region.flush() {
            Ok(Some(path)) => writeln!(
                out,
                "OK {} (files={})",
                path.display(),
                region.file_count()
            )?,
            Ok(None) => writeln!(out, "OK (nothing to flush)")?,
            Err(e) => writeln!(out, "ERR flush failed: {e:#}")?,
        },
        "STATS" => writeln!(out, "{region:?}")?,
        "EXIT" | "QUIT" => {
            writeln!(out, "bye")?;
            return Ok(false);
        }
        other => writeln!(out, "unknown command: {other}")?,
    }
    Ok(true)
}

/// `-` stands for an open bound.
fn open_bound(arg: Option<&str>) -> &str {
    match arg {
        None | Some("-") => "",
        Some(s) => s,
    }
}

/// `cf:a=1 cf:b=2`
fn format_fields(row: &Row) -> String {
    row.cells()
        .iter()
        .map(|c| format!("{}={}", c.column, String::from_utf8_lossy(&c.value)))
        .collect::<Vec<_>>()
        .join(" ")
}
