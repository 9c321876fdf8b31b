use serde::{Deserialize, Serialize};

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("failed to serialize json: {}", e),
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ErrorOut<'a> {
    pub code: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
}

pub fn print_json_error(code: &str, message: &str, hint: Option<&str>) {
    let err = ErrorOut { code, message, hint };
    print_json(&err);
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Parse a model reply into Q/A pairs. Lines starting with `Q:`/`Q<n>:`
/// open a pair; `A:`/`A<n>:` lines close it. Continuation lines attach to
/// whichever side is open. Unpaired trailing questions are kept with an
/// empty answer.
pub fn parse_qa_pairs(reply: &str) -> Vec<QaPair> {
    enum Side {
        None,
        Question,
        Answer,
    }

    fn strip_tag(line: &str, tag: char) -> Option<&str> {
        let rest = line.strip_prefix(tag).or_else(|| {
            let lower = tag.to_ascii_lowercase();
            line.strip_prefix(lower)
        })?;
        let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
        rest.strip_prefix(':').map(str::trim_start)
    }

    let mut pairs: Vec<QaPair> = Vec::new();
    let mut question = String::new();
    let mut answer = String::new();
    let mut side = Side::None;

    fn flush(pairs: &mut Vec<QaPair>, question: &mut String, answer: &mut String) {
        if !question.trim().is_empty() {
            pairs.push(QaPair {
                question: question.trim().to_string(),
                answer: answer.trim().to_string(),
            });
        }
        question.clear();
        answer.clear();
    }

    for line in reply.lines() {
        let trimmed = line.trim();
        if let Some(q) = strip_tag(trimmed, 'Q') {
            flush(&mut pairs, &mut question, &mut answer);
            question.push_str(q);
            side = Side::Question;
        } else if let Some(a) = strip_tag(trimmed, 'A') {
            answer.push_str(a);
            side = Side::Answer;
        } else if !trimmed.is_empty() {
            match side {
                Side::Question => {
                    question.push(' ');
                    question.push_str(trimmed);
                }
                Side::Answer => {
                    answer.push(' ');
                    answer.push_str(trimmed);
                }
                Side::None => {}
            }
        }
    }
    flush(&mut pairs, &mut question, &mut answer);
    pairs
}

/// End-of-run console report for batch commands.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ProcessingSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outputs: Vec<String>,
}

pub fn render_processing_summary(title: &str, summary: &ProcessingSummary) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
    println!("Processed: {}", summary.processed);
    println!("Skipped:   {}", summary.skipped);
    println!("Failed:    {}", summary.failed);
    if !summary.outputs.is_empty() {
        println!("Outputs:");
        for out in &summary.outputs {
            println!("  {}", out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_q_a_lines() {
        let reply = "Q: What is the capital?\nA: Paris.\nQ: Who wrote it?\nA: Hugo.";
        let pairs = parse_qa_pairs(reply);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "What is the capital?");
        assert_eq!(pairs[0].answer, "Paris.");
        assert_eq!(pairs[1].answer, "Hugo.");
    }

    #[test]
    fn parses_numbered_tags() {
        let reply = "Q1: First question?\nA1: First answer.\nQ2: Second?\nA2: Second.";
        let pairs = parse_qa_pairs(reply);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].question, "Second?");
    }

    #[test]
    fn continuation_lines_join_the_open_side() {
        let reply = "Q: A question that\nspans two lines?\nA: An answer that\nalso wraps.";
        let pairs = parse_qa_pairs(reply);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "A question that spans two lines?");
        assert_eq!(pairs[0].answer, "An answer that also wraps.");
    }

    #[test]
    fn unanswered_trailing_question_is_kept() {
        let reply = "Q: Answered?\nA: Yes.\nQ: Dangling?";
        let pairs = parse_qa_pairs(reply);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].question, "Dangling?");
        assert_eq!(pairs[1].answer, "");
    }

    #[test]
    fn noise_outside_pairs_is_ignored() {
        let reply = "Here are your questions:\n\nQ: Real one?\nA: Real answer.";
        let pairs = parse_qa_pairs(reply);
        assert_eq!(pairs.len(), 1);
    }
}
