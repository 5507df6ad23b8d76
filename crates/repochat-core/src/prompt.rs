//! Grounded prompt assembly.

use repochat_index::ScoredUnit;
use repochat_llm::Message;

/// Instruction sent as the system message of every grounded request.
pub const SYSTEM_PROMPT: &str = "You are an assistant that helps users understand source code \
repositories. Answer using only the context you are given. If the context does not contain \
the answer, say \"I don't know!\".";

const CONTEXT_RULE: &str = "---------------------";

/// Join retrieved unit texts, best match first, into one context block.
#[must_use]
pub fn build_context(hits: &[ScoredUnit]) -> String {
    hits.iter()
        .map(|hit| hit.unit.text())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System and user messages for answering `query` from `context`.
///
/// No earlier turns are included; each question is answered from the
/// retrieved context alone.
#[must_use]
pub fn grounded_messages(context: &str, query: &str) -> Vec<Message> {
    let user = format!(
        "Context from the repository:\n{CONTEXT_RULE}\n{context}\n{CONTEXT_RULE}\n\
         Using only the context above, reason step by step and give a precise, concise \
         answer to the question. If the context is not enough, answer \"I don't know!\".\n\
         Question: {query}\n\
         Answer: "
    );
    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}
