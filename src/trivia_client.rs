use anyhow::{Result, bail};
use regex::{Captures, Regex};
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, error};

use crate::config::TriviaConfig;
use crate::errors::QuizError;
use crate::models::Question;

// Import logging macros
use crate::{log_service_start, log_service_success};

const SERVICE_NAME: &str = "Open Trivia DB";

/// Raw response body from the trivia API
#[derive(Debug, Deserialize)]
struct TriviaResponse {
    #[serde(default)]
    response_code: u8,
    #[serde(default)]
    results: Vec<TriviaItem>,
}

#[derive(Debug, Deserialize)]
struct TriviaItem {
    question: String,
    correct_answer: String,
    incorrect_answers: Vec<String>,
    category: String,
    difficulty: String,
}

/// HTTP client for the Open Trivia Database question endpoint
#[derive(Debug, Clone)]
pub struct TriviaClient {
    client: Client,
    base_url: String,
    category: Option<u32>,
    difficulty: Option<String>,
}

impl TriviaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            category: None,
            difficulty: None,
        }
    }

    pub fn from_config(config: &TriviaConfig) -> Self {
        let mut client = Self::new(config.base_url.clone());
        client.category = config.category;
        client.difficulty = config.difficulty.clone();
        client
    }

    /// Fetch `count` multiple-choice questions.
    ///
    /// Fails on network errors, a non-zero `response_code`, or a batch that does
    /// not contain exactly `count` well-formed questions.
    pub async fn fetch_questions(&self, count: usize) -> Result<Vec<Question>> {
        if count == 0 {
            bail!("question count must be positive");
        }

        log_service_start!("trivia_client", "fetch_questions", count = count);
        let started = Instant::now();

        let mut query: Vec<(&str, String)> = vec![
            ("amount", count.to_string()),
            ("type", "multiple".to_string()),
        ];
        if let Some(category) = self.category {
            query.push(("category", category.to_string()));
        }
        if let Some(difficulty) = &self.difficulty {
            query.push(("difficulty", difficulty.clone()));
        }

        let response = self
            .client
            .get(format!("{}/api.php", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| QuizError::network(SERVICE_NAME, e))?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Trivia API request failed");
            return Err(QuizError::UpstreamError {
                service: SERVICE_NAME,
                message: format!("HTTP {}", status),
            }
            .into());
        }

        let body: TriviaResponse = response.json().await.map_err(|e| QuizError::MalformedResponse {
            service: SERVICE_NAME,
            message: e.to_string(),
        })?;

        if body.response_code != 0 {
            return Err(QuizError::UpstreamError {
                service: SERVICE_NAME,
                message: describe_response_code(body.response_code).to_string(),
            }
            .into());
        }

        if body.results.len() != count {
            return Err(QuizError::MalformedResponse {
                service: SERVICE_NAME,
                message: format!("expected {} questions, got {}", count, body.results.len()),
            }
            .into());
        }

        let questions = body
            .results
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()?;

        log_service_success!(
            "trivia_client",
            "fetch_questions",
            count = questions.len(),
            duration_ms = started.elapsed().as_millis() as u64
        );

        Ok(questions)
    }
}

fn normalize(item: TriviaItem) -> Result<Question, QuizError> {
    let correct_answer = decode_html_entities(&item.correct_answer);
    if correct_answer.trim().is_empty() {
        return Err(QuizError::MalformedResponse {
            service: SERVICE_NAME,
            message: "question without a correct answer".to_string(),
        });
    }

    let mut options: Vec<String> = item
        .incorrect_answers
        .iter()
        .map(|answer| decode_html_entities(answer))
        .collect();
    options.push(correct_answer.clone());

    let question = Question {
        text: decode_html_entities(&item.question),
        correct_answer,
        options,
        category: decode_html_entities(&item.category),
        difficulty: item.difficulty,
    };

    debug!(
        category = %question.category,
        difficulty = %question.difficulty,
        option_count = question.options.len(),
        "Normalized trivia question"
    );

    Ok(question)
}

fn describe_response_code(code: u8) -> &'static str {
    match code {
        1 => "not enough questions available for this query",
        2 => "invalid parameter in the request",
        3 => "session token not found",
        4 => "session token has returned all possible questions",
        5 => "rate limit exceeded, wait a few seconds and retry",
        _ => "unknown response code",
    }
}

/// Decode the HTML character references the trivia API embeds in its text
pub fn decode_html_entities(text: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let entity = ENTITY.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+[0-9]*);").expect("valid entity regex")
    });

    entity
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "quot" => '"',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "shy" => '\u{ad}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "deg" => '\u{b0}',
        "pi" => '\u{3c0}',
        "eacute" => 'é',
        "Eacute" => 'É',
        "egrave" => 'è',
        "aacute" => 'á',
        "agrave" => 'à',
        "iacute" => 'í',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "ntilde" => 'ñ',
        "ccedil" => 'ç',
        "auml" => 'ä',
        "ouml" => 'ö',
        "Ouml" => 'Ö',
        "uuml" => 'ü',
        "Uuml" => 'Ü',
        "euml" => 'ë',
        "aring" => 'å',
        "oslash" => 'ø',
        "szlig" => 'ß',
        "sup2" => '²',
        "sup3" => '³',
        "times" => '×',
        "divide" => '÷',
        "copy" => '©',
        "reg" => '®',
        "trade" => '\u{2122}',
        _ => return None,
    };
    Some(c)
}
