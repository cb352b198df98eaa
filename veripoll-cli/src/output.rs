/// Output formatting: round banners, stopping-size tables and transcript JSON.
use std::path::Path;

use veripoll_core::{Round, RoundDecision};

use crate::bail;

/// Print the end-of-round banner.
pub fn round_banner(round: &Round) {
    let stopped = round.decision == RoundDecision::Stop;
    println!("\n==============================");
    println!("Round {}", round.round);
    println!("Cumulative sample size: {}", round.size);
    println!("Winner ballots in sample: {}", round.winner_ballots);
    println!("Loser ballots in sample: {}", round.loser_ballots);
    match round.kmin {
        Some(k) => println!("Minimum winner ballots to stop: {k}"),
        None => println!("Minimum winner ballots to stop: none at this sample size"),
    }
    println!("Risk level: {:.6}", round.risk);
    println!("Stopping Condition Met? {}", if stopped { "True" } else { "False" });
    println!("==============================");
}

/// Format a round-size/stopping-size table.
pub fn kmin_table(sizes: &[u64], kmins: &[Option<u64>]) -> String {
    let mut out = format!("\n{:^20}|{:^20}\n", "Round Sizes", "Stopping Sizes");
    out += "--------------------|--------------------\n";
    for (size, kmin) in sizes.iter().zip(kmins) {
        let k = kmin.map_or_else(|| "None".to_string(), |k| k.to_string());
        out += &format!("{:^20}|{:^20}\n", size, k);
    }
    out
}

/// Format a replayed round schedule with decisions.
pub fn decision_table(rounds: &[Round]) -> String {
    let mut out = format!(
        "\n{:^8}|{:^12}|{:^10}|{:^10}|{:^8}|{:^14}|{:^10}\n",
        "Round", "Sample", "Winner", "Loser", "kmin", "Risk", "Decision"
    );
    out += &"-".repeat(78);
    out += "\n";
    for r in rounds {
        let kmin = r.kmin.map_or_else(|| "None".to_string(), |k| k.to_string());
        let decision = match r.decision {
            RoundDecision::Stop => "STOP",
            RoundDecision::Continue => "CONTINUE",
        };
        out += &format!(
            "{:^8}|{:^12}|{:^10}|{:^10}|{:^8}|{:^14.6}|{:^10}\n",
            r.round, r.size, r.winner_ballots, r.loser_ballots, kmin, r.risk, decision
        );
    }
    out
}

/// Serialize a transcript as a JSON list of round records.
pub fn transcript_json(rounds: &[Round]) -> String {
    serde_json::to_string_pretty(rounds).expect("round records serialize")
}

/// Write the transcript JSON to a file.
pub fn write_transcript(path: &Path, rounds: &[Round]) {
    std::fs::write(path, transcript_json(rounds))
        .unwrap_or_else(|e| bail(format!("Failed to write transcript {}: {e}", path.display())));
    println!("Transcript written to {}", path.display());
}

/// Write to a file, or print to stdout when no path is given.
pub fn write_or_print(path: Option<&Path>, content: &str) {
    match path {
        Some(p) => std::fs::write(p, content)
            .unwrap_or_else(|e| bail(format!("Failed to write output {}: {e}", p.display()))),
        None => println!("{content}"),
    }
}
