#![forbid(unsafe_code)]

use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
/// Number of characters in an acrostic word, and lines in its poem.
pub const WORD_LEN: usize = 3;

/// User-facing message for words that are missing or the wrong length.
pub const INVALID_WORD_MSG: &str = "3글자를 입력해주세요.";

/// The instruction sent as the system prompt with every word.  The formatter
/// relies on the `<character>: <sentence>` line shape it asks for.
pub const SYSTEM_PROMPT: &str = "당신은 삼행시 작가입니다.
사용자가 입력한 3글자로 삼행시를 작성하세요.

규칙:
1. 각 글자로 시작하는 문장을 작성합니다.
2. 긍정적이고 유머러스한 톤을 유지합니다.
3. 각 줄은 자연스럽게 이어져야 합니다.

출력 형식 (반드시 이 형식만 출력):
[첫번째글자]: [문장]
[두번째글자]: [문장]
[세번째글자]: [문장]

주의: 삼행시 3줄만 출력하세요. 인사말, 설명, 부연설명 등 다른 텍스트는 절대 포함하지 마세요.";

// ***************************************************************************
//                                PromptSpec
// ***************************************************************************
/// The system instruction and the single user message for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub system: &'static str,
    pub user: String,
}

// ---------------------------------------------------------------------------
// build_prompt:
// ---------------------------------------------------------------------------
/** Validate the word and embed it, unmodified, as the user message.  The
 * length is counted in unicode scalar values.
 */
pub fn build_prompt(input: &str) -> Result<PromptSpec, Errors> {
    if input.chars().count() != WORD_LEN {
        return Err(Errors::InvalidInput(INVALID_WORD_MSG.to_string()));
    }

    Ok(PromptSpec { system: SYSTEM_PROMPT, user: input.to_string() })
}
