/// Input handling: interactive prompts, contest files and bulk-mode
/// argument parsing.
///
/// Prompts re-ask after a single-line complaint on bad input; a closed
/// input stream ends the process with exit code 1.
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use veripoll_core::{Contest, ContestType};

use crate::bail;

/// Contest data on disk:
/// `{"ballots": 1000, "tallies": {"A": 700, "B": 300}, "winners": ["A"], "type": "PLURALITY"}`
#[derive(Deserialize)]
pub struct ContestFile {
    pub ballots: u64,
    pub tallies: BTreeMap<String, u64>,
    pub winners: Vec<String>,
    #[serde(rename = "type")]
    pub contest_type: ContestType,
}

/// Load and validate a contest from a JSON file.
pub fn load_contest(path: &Path) -> Contest {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| bail(format!("Failed to read contest file {}: {e}", path.display())));
    let file: ContestFile = serde_json::from_str(&content)
        .unwrap_or_else(|e| bail(format!("Failed to parse contest file {}: {e}", path.display())));
    Contest::new(file.ballots, file.tallies, file.winners, file.contest_type)
        .unwrap_or_else(|e| bail(format!("Invalid contest in {}: {e}", path.display())))
}

/// Parse a space separated cumulative round schedule, e.g. "100 200 400".
pub fn parse_schedule(value: &str) -> Result<Vec<u64>, String> {
    let sizes: Vec<u64> = value
        .split_whitespace()
        .map(|s| s.parse::<u64>().map_err(|_| format!("\"{s}\" is not a round size")))
        .collect::<Result<_, _>>()?;
    if sizes.is_empty() {
        return Err("round schedule is empty".to_string());
    }
    for w in sizes.windows(2) {
        if w[1] <= w[0] {
            return Err(format!("round schedule must strictly increase ({} after {})", w[1], w[0]));
        }
    }
    Ok(sizes)
}

/// Parse observed cumulative winner:loser totals, e.g. "57:43 120:80".
pub fn parse_observations(value: &str) -> Result<Vec<(u64, u64)>, String> {
    value
        .split_whitespace()
        .map(|tok| {
            let (w, l) = tok
                .split_once(':')
                .ok_or_else(|| format!("\"{tok}\" is not winner:loser"))?;
            let w = w.parse::<u64>().map_err(|_| format!("\"{tok}\" is not winner:loser"))?;
            let l = l.parse::<u64>().map_err(|_| format!("\"{tok}\" is not winner:loser"))?;
            Ok((w, l))
        })
        .collect()
}

fn warn(msg: impl std::fmt::Display) {
    println!("INVALID INPUT: {msg}");
}

fn read_line(prompt: &str) -> String {
    print!("{prompt}: ");
    io::stdout().flush().ok();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => {
            eprintln!("Input stream closed.");
            std::process::exit(1);
        }
        Ok(_) => line.trim().to_string(),
        Err(e) => {
            eprintln!("Failed to read input: {e}");
            std::process::exit(1);
        }
    }
}

/// Prompt until the answer parses.
pub fn prompt<T: FromStr>(msg: &str) -> T {
    loop {
        match read_line(msg).parse::<T>() {
            Ok(v) => return v,
            Err(_) => warn("could not parse value"),
        }
    }
}

/// Prompt for an integer within `[lo, hi]`.
pub fn prompt_int_range(msg: &str, lo: u64, hi: u64) -> u64 {
    loop {
        let v: u64 = prompt(msg);
        if (lo..=hi).contains(&v) {
            return v;
        }
        warn(format!("value must be between {lo} and {hi}"));
    }
}

/// Prompt for a fraction in (0, 1), optionally closed at 1.
pub fn prompt_fraction(msg: &str, include_one: bool) -> f64 {
    loop {
        let v: f64 = prompt(msg);
        if v > 0.0 && (v < 1.0 || (include_one && v == 1.0)) {
            return v;
        }
        warn(if include_one {
            "value must be greater than 0 and at most 1"
        } else {
            "value must be strictly between 0 and 1"
        });
    }
}

/// Yes/no prompt.
pub fn confirm(msg: &str) -> bool {
    loop {
        match read_line(&format!("{msg} [y/n]")).to_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => warn("answer y or n"),
        }
    }
}

/// Prompt for one of a fixed set of choices (case-insensitive).
pub fn prompt_choice(msg: &str, choices: &[&str]) -> String {
    let listed = choices.join("/");
    loop {
        let v = read_line(&format!("{msg} ({listed})")).to_lowercase();
        if choices.contains(&v.as_str()) {
            return v;
        }
        warn(format!("choose one of: {listed}"));
    }
}

/// Build a contest from prompts, re-starting after any invalid entry.
pub fn input_contest() -> Contest {
    loop {
        println!("\nCreate a new Contest");
        println!("====================\n");

        let ballots = prompt_int_range("Enter number of contest ballots", 1, u64::MAX);
        let num_candidates = prompt_int_range("Enter number of candidates", 2, 1000);

        let mut tally: BTreeMap<String, u64> = BTreeMap::new();
        let mut running_total: u64 = 0;
        let mut overflow = false;
        for _ in 0..num_candidates {
            let name = loop {
                let name = read_line("Enter candidate name");
                if name.is_empty() {
                    warn("candidate name cannot be empty");
                } else if tally.contains_key(&name) {
                    warn("candidate already entered");
                } else {
                    break name;
                }
            };
            let votes = prompt_int_range(
                &format!("Enter number of votes reported for {name}"),
                0,
                ballots,
            );
            running_total += votes;
            if running_total > ballots {
                warn("Exceeded total ballots cast in contest.");
                println!("Restarting tally process...");
                overflow = true;
                break;
            }
            tally.insert(name, votes);
        }
        if overflow {
            continue;
        }

        let num_winners = prompt_int_range("Enter number of winners", 1, num_candidates - 1);
        let mut winners = Vec::with_capacity(num_winners as usize);
        for _ in 0..num_winners {
            let winner = loop {
                let name = read_line("Enter winner name");
                if !tally.contains_key(&name) {
                    warn("winner must be one of the entered candidates");
                } else if winners.contains(&name) {
                    warn("winner already entered");
                } else {
                    break name;
                }
            };
            winners.push(winner);
        }

        let contest_type = match prompt_choice("Select contest type", &["plurality", "majority"]).as_str() {
            "majority" => ContestType::Majority,
            _ => ContestType::Plurality,
        };

        match Contest::new(ballots, tally, winners, contest_type) {
            Ok(contest) => return contest,
            Err(e) => warn(e),
        }
    }
}
