//! Shell tests: commands are fed through `shell::run` in-process.

use anyhow::Result;
use cli::shell;
use config::RegionConfig;
use region::Region;
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;

fn manual_region(dir: &Path) -> Result<Region> {
    Region::open(RegionConfig::new(dir).with_auto_flush(false))
}

/// Runs `script` and returns the output with prompts stripped, one entry per
/// line.
fn run_script(region: &Region, script: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    shell::run(region, Cursor::new(script.as_bytes()), &mut out)?;
    let text = String::from_utf8(out)?;
    Ok(text
        .lines()
        .map(|l| l.trim_start_matches("> ").to_string())
        .filter(|l| !l.is_empty() && l != ">")
        .collect())
}

// --------------------- Basic commands ---------------------

#[test]
fn put_get_roundtrip() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(
        &region,
        "PUT user1 info:name Alice Smith\nPUT user1 info:age 30\nGET user1\nGET nobody\n",
    )?;
    assert_eq!(out, vec!["OK", "OK", "info:age=30 info:name=Alice Smith", "(nil)"]);
    Ok(())
}

#[test]
fn commands_are_case_insensitive() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(&region, "put k cf:q v\nget k\n")?;
    assert_eq!(out, vec!["OK", "cf:q=v"]);
    Ok(())
}

#[test]
fn del_reports_whether_row_was_buffered() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(&region, "PUT k cf:q v\nDEL k\nDEL k\nGET k\n")?;
    assert_eq!(out, vec!["OK", "OK", "OK (not in memtable)", "(nil)"]);
    Ok(())
}

#[test]
fn scan_with_bounds_and_limit() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let mut script = String::new();
    for k in ["a", "b", "c", "d"] {
        script.push_str(&format!("PUT {k} cf:q {k}1\n"));
    }
    script.push_str("SCAN b d\nSCAN - - 1\nSCAN x\n");

    let out = run_script(&region, &script)?;
    assert_eq!(
        &out[4..],
        &[
            "b -> cf:q=b1",
            "c -> cf:q=c1",
            "(2 rows)",
            "a -> cf:q=a1",
            "(1 rows)",
            "(empty)",
        ]
    );
    Ok(())
}

#[test]
fn flush_and_stats() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(&region, "FLUSH\nPUT k cf:q v\nFLUSH\nSTATS\nGET k\n")?;

    assert_eq!(out[0], "OK (nothing to flush)");
    assert!(out[2].starts_with("OK ") && out[2].ends_with("(files=1)"), "{}", out[2]);
    assert!(out[3].starts_with("Region {"), "{}", out[3]);
    assert!(out[3].contains("file_count: 1"));
    assert_eq!(out[4], "cf:q=v");
    Ok(())
}

// --------------------- Errors and control ---------------------

#[test]
fn usage_errors_do_not_stop_the_shell() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(
        &region,
        "PUT\nPUT k nocolon v\nPUT k cf:q\nGET\nDEL\nSCAN a b notanumber\nBOGUS\n\nGET k\n",
    )?;
    assert_eq!(
        out,
        vec![
            "ERR usage: PUT row family:qualifier value",
            "ERR column must be family:qualifier, got nocolon",
            "ERR usage: PUT row family:qualifier value",
            "ERR usage: GET row",
            "ERR usage: DEL row",
            "ERR usage: SCAN [start] [stop] [limit]",
            "unknown command: BOGUS",
            "(nil)",
        ]
    );
    Ok(())
}

#[test]
fn exit_stops_reading() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let out = run_script(&region, "PUT k cf:q v\nEXIT\nPUT never cf:q v\n")?;
    assert_eq!(out, vec!["OK", "bye"]);
    assert!(region.get(b"never")?.is_none());
    Ok(())
}

#[test]
fn quit_then_reopen_sees_flushed_data() -> Result<()> {
    let dir = tempdir()?;
    {
        let region = manual_region(dir.path())?;
        run_script(&region, "PUT k cf:q persisted\nQUIT\n")?;
    }
    let region = manual_region(dir.path())?;
    let out = run_script(&region, "GET k\n")?;
    assert_eq!(out, vec!["cf:q=persisted"]);
    Ok(())
}

#[test]
fn execute_single_command() -> Result<()> {
    let dir = tempdir()?;
    let region = manual_region(dir.path())?;
    let mut out = Vec::new();
    assert!(shell::execute(&region, "PUT k cf:q v", &mut out)?);
    assert!(!shell::execute(&region, "exit", &mut out)?);
    assert_eq!(String::from_utf8(out)?, "OK\nbye\n");
    Ok(())
}
