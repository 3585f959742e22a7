// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Human-readable rendering of API responses

use anyhow::Result;
use colored::Colorize;

use aegis_cortex::presentation::api::{ApiResponse, ConstraintView, CreatedPattern, ResponseData};

/// Print a response; returns whether it was a success
pub fn render(response: &ApiResponse, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response.to_json())?);
        return Ok(response.is_success());
    }

    match response {
        ApiResponse::Success { data, .. } => {
            render_data(data);
            Ok(true)
        }
        ApiResponse::Failure { error, .. } => {
            eprintln!("{} {}", format!("✗ [{}]", error.code).red().bold(), error.message);
            Ok(false)
        }
    }
}

fn render_data(data: &ResponseData) {
    match data {
        ResponseData::Discover(d) => {
            if d.patterns.is_empty() {
                println!("{}", format!("No candidates found ({} nodes sampled)", d.sampled_nodes).yellow());
                return;
            }
            println!("{} candidates found ({} nodes sampled):", d.patterns_found, d.sampled_nodes);
            println!("{:<38} {:<10} {:<9} {}", "ID", "CONFIDENCE", "INSTANCES", "OBSERVATION");
            for c in &d.patterns {
                println!(
                    "{:<38} {:<10.3} {:<9} {}",
                    c.id,
                    c.confidence,
                    c.instance_count,
                    c.observation
                );
            }
        }
        ResponseData::Pattern(p) => render_created(&p.pattern),
        ResponseData::Execute(e) => {
            if e.matches.is_empty() {
                println!("{}", format!("No matches for '{}'", e.pattern_name).yellow());
                return;
            }
            println!("{} matches for '{}':", e.total_matches, e.pattern_name.bold());
            for m in &e.matches {
                println!(
                    "  {:.3}  {}  {}",
                    m.score,
                    m.id.bold(),
                    format!("[{}/{}]", m.author_role, m.source_type).dimmed()
                );
                println!("         {}", m.preview);
            }
        }
        ResponseData::List(l) => {
            if l.patterns.is_empty() {
                println!("{}", "No patterns found".yellow());
                return;
            }
            println!("{} patterns:", l.pattern_count);
            println!("{:<36} {:<9} {:<6} {:<8} {}", "NAME", "TYPE", "USES", "SUCCESS", "DESCRIPTION");
            for p in &l.patterns {
                println!(
                    "{:<36} {:<9} {:<6} {:<8.3} {}",
                    p.name.bold(),
                    p.pattern_type,
                    p.usage_count,
                    p.success_rate,
                    p.description
                );
            }
        }
        ResponseData::Get(g) => {
            let p = &g.pattern;
            println!("{} ({})", p.name.bold(), p.pattern_type);
            println!("  ID: {}", p.id);
            println!("  Description: {}", p.description);
            if !p.tags.is_empty() {
                println!("  Tags: {}", p.tags.join(", "));
            }
            println!("  Usage: {}  Success rate: {:.3}", p.usage_count, p.success_rate);
            if let Some(dimensions) = &p.dimensions {
                println!("  Dimensions:");
                for d in dimensions {
                    let learned = if d.learned { " (learned)" } else { "" };
                    println!("    - {} w={:.3}{}: {}", d.dimension_type.as_str(), d.weight, learned, d.description);
                }
            }
            if !p.operands.is_empty() {
                println!("  Operands: {}", p.operands.join(", "));
            }
            render_constraints(&g.learned_constraints);
        }
        ResponseData::Feedback(f) => {
            println!("{}", format!("✓ {}", f.message).green());
            println!("  Success rate: {:.3}", f.success_rate);
            if f.learned_constraints_count > 0 {
                render_constraints(&f.learned_constraints);
            }
        }
        ResponseData::Constraints(c) => {
            println!("{} constraints on '{}':", c.constraint_count, c.pattern_name.bold());
            render_constraints(&c.constraints);
        }
    }
}

fn render_created(p: &CreatedPattern) {
    println!("{}", format!("✓ Pattern created: {}", p.name).green());
    println!("  ID: {}", p.id);
    println!("  Type: {}", p.pattern_type);
    println!("  Description: {}", p.description);
    if let Some(count) = p.dimension_count {
        println!("  Dimensions: {}", count);
    }
    if let (Some(base), Some(specialization)) = (&p.base_pattern, &p.specialization) {
        println!("  Refines: {} with \"{}\"", base, specialization);
    }
}

fn render_constraints(constraints: &[ConstraintView]) {
    if constraints.is_empty() {
        println!("  {}", "No learned constraints".dimmed());
        return;
    }
    println!("  Learned constraints:");
    for c in constraints {
        println!(
            "    - [{:.3}] {} {}",
            c.confidence,
            c.description,
            format!("({} feedback)", c.source_feedback_count).dimmed()
        );
    }
}
