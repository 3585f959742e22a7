// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pattern operations
//!
//! Each subcommand maps onto one API request; the response envelope is
//! rendered by [`crate::output`].

use anyhow::Result;
use clap::Subcommand;

use aegis_cortex::domain::feedback::Judgment;
use aegis_cortex::presentation::api::{
    ComposeRequest, DescribeRequest, DiscoverRequest, ExecuteRequest, FeedbackRequest, ListRequest, PatternRef,
    PatternRequest, PromoteRequest, SpecializeRequest,
};

use crate::output;
use crate::runtime::{build_api, RuntimeOptions};

#[derive(Subcommand)]
pub enum PatternCommand {
    /// Mine the corpus for recurring pattern candidates
    Discover {
        /// Restrict sampling to these source types
        #[arg(long = "source-type", value_name = "TYPE")]
        source_types: Vec<String>,

        /// Minimum cluster size
        #[arg(long)]
        min_instances: Option<usize>,

        /// Maximum number of candidates
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Re-run discovery and promote one candidate to a pattern
    Promote {
        /// Candidate ID reported by `discover`
        #[arg(value_name = "CANDIDATE_ID")]
        candidate_id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Same filters as the discover run that produced the candidate
        #[arg(long = "source-type", value_name = "TYPE")]
        source_types: Vec<String>,

        #[arg(long)]
        min_instances: Option<usize>,
    },

    /// Create an atomic pattern from a natural-language description
    Describe {
        #[arg(value_name = "DESCRIPTION")]
        description: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Run a pattern against the corpus
    Execute {
        #[arg(value_name = "PATTERN")]
        pattern: String,

        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// List patterns
    List {
        /// Hide built-in patterns
        #[arg(long)]
        no_builtin: bool,

        /// Only patterns carrying any of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show a pattern and its learned constraints
    Get {
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },

    /// Judge one match of a pattern
    Feedback {
        #[arg(value_name = "PATTERN")]
        pattern: String,

        #[arg(value_name = "CONTENT_ID")]
        content_id: String,

        /// correct | incorrect | partial
        #[arg(value_name = "JUDGMENT")]
        judgment: Judgment,

        #[arg(long)]
        explanation: Option<String>,
    },

    /// Show learned constraints of a pattern
    Constraints {
        #[arg(value_name = "PATTERN")]
        pattern: String,
    },

    /// Combine patterns with AND, OR, NOT, SEQUENCE or REFINE
    Compose {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "OPERATOR")]
        operator: String,

        #[arg(value_name = "PATTERN", num_args = 1..)]
        patterns: Vec<String>,

        #[arg(long, default_value = "")]
        description: String,

        /// SEQUENCE without thread order
        #[arg(long)]
        unordered: bool,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Narrow a pattern with an extra description
    Specialize {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "BASE_PATTERN")]
        base_pattern: String,

        #[arg(value_name = "SPECIALIZATION")]
        specialization: String,

        #[arg(long, default_value = "")]
        description: String,
    },
}

/// Returns whether the operation succeeded
pub async fn handle_command(command: PatternCommand, options: RuntimeOptions) -> Result<bool> {
    let api = build_api(&options).await?;

    // candidate ids are derived from cluster membership, so re-running the
    // same discovery reproduces the candidate being promoted
    if let PatternCommand::Promote {
        source_types,
        min_instances,
        ..
    } = &command
    {
        let discovered = api
            .handle(PatternRequest::Discover(DiscoverRequest {
                source_types: source_types.clone(),
                min_instances: *min_instances,
                limit: None,
            }))
            .await;
        if !discovered.is_success() {
            return output::render(&discovered, options.json);
        }
    }

    let response = api.handle(into_request(command)).await;
    output::render(&response, options.json)
}

/// Handle a raw JSON request and print the envelope
pub async fn handle_raw(body: String, options: RuntimeOptions) -> Result<bool> {
    let api = build_api(&options).await?;
    let raw = if body == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        body
    };

    let response = api.handle_json(&raw).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response["success"].as_bool().unwrap_or(false))
}

fn into_request(command: PatternCommand) -> PatternRequest {
    match command {
        PatternCommand::Discover {
            source_types,
            min_instances,
            limit,
        } => PatternRequest::Discover(DiscoverRequest {
            source_types,
            min_instances,
            limit,
        }),
        PatternCommand::Describe { description, name, tags } => {
            PatternRequest::Describe(DescribeRequest { description, name, tags })
        }
        PatternCommand::Execute {
            pattern,
            limit,
            min_confidence,
        } => PatternRequest::Execute(ExecuteRequest {
            pattern_name: pattern,
            limit,
            min_confidence,
        }),
        PatternCommand::List { no_builtin, tags } => PatternRequest::List(ListRequest {
            include_builtin: !no_builtin,
            tags,
        }),
        PatternCommand::Get { pattern } => PatternRequest::Get(PatternRef { pattern_name: pattern }),
        PatternCommand::Feedback {
            pattern,
            content_id,
            judgment,
            explanation,
        } => PatternRequest::Feedback(FeedbackRequest {
            pattern_name: pattern,
            content_id,
            judgment,
            explanation,
        }),
        PatternCommand::Constraints { pattern } => PatternRequest::GetConstraints(PatternRef { pattern_name: pattern }),
        PatternCommand::Compose {
            name,
            operator,
            patterns,
            description,
            unordered,
            tags,
        } => PatternRequest::Compose(ComposeRequest {
            name,
            description,
            operator,
            patterns,
            ordered: !unordered,
            tags,
        }),
        PatternCommand::Specialize {
            name,
            base_pattern,
            specialization,
            description,
        } => PatternRequest::Specialize(SpecializeRequest {
            name,
            description,
            base_pattern,
            specialization,
        }),
        PatternCommand::Promote { candidate_id, name, tags, .. } => {
            PatternRequest::Promote(PromoteRequest { candidate_id, name, tags })
        }
    }
}
