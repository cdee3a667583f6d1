//! Prompt templates for the three completion calls of a research turn.
//!
//! Each template is a pure function of its named fields.

/// Fields of the per-round analysis prompt.
pub struct AnalysisFields<'a> {
    pub query: &'a str,
    pub keywords: &'a str,
    pub search_result: &'a str,
}

/// Fields of the continuation-decision prompt.
pub struct DecisionFields<'a> {
    pub query: &'a str,
    pub current_analysis: &'a str,
}

/// Fields of the final synthesis prompt.
pub struct SynthesisFields<'a> {
    pub query: &'a str,
    pub full_analysis: &'a str,
}

/// Label of the decision line carrying the Yes/No verdict.
pub const NEED_MORE_LABEL: &str = "필요여부";
/// Label of the decision line carrying the keywords.
pub const KEYWORDS_LABEL: &str = "키워드";
/// Keyword value meaning "no further search".
pub const NO_KEYWORDS: &str = "없음";

pub fn analysis(fields: &AnalysisFields<'_>) -> String {
    format!(
        "\n다음 질문 및 키워드에 대한 검색 결과를 분석하고 요약해주세요:\n\
         질문: {query}\n\
         키워드: {keywords}\n\
         \n\
         검색 결과:\n\
         {search_result}\n\
         \n\
         요약:\n",
        query = fields.query,
        keywords = fields.keywords,
        search_result = fields.search_result,
    )
}

pub fn decision(fields: &DecisionFields<'_>) -> String {
    format!(
        "\n다음 정보를 바탕으로, 추가 검색이 필요한지 판단하고 필요하다면 검색 키워드를 제시해주세요:\n\
         \n\
         질문: {query}\n\
         현재까지의 분석: {current_analysis}\n\
         \n\
         형식:\n\
         {need}: [Yes/No]\n\
         {kw}: [추가 검색이 필요한 경우 3개 이하의 키워드, 불필요한 경우 \"{none}\"]\n\
         \n\
         결정:\n",
        query = fields.query,
        current_analysis = fields.current_analysis,
        need = NEED_MORE_LABEL,
        kw = KEYWORDS_LABEL,
        none = NO_KEYWORDS,
    )
}

pub fn synthesis(fields: &SynthesisFields<'_>) -> String {
    format!(
        "\n다음 정보를 바탕으로 최종 응답을 생성해주세요:\n\
         \n\
         질문: {query}\n\
         전체 분석 내용: {full_analysis}\n\
         \n\
         최종 응답:\n",
        query = fields.query,
        full_analysis = fields.full_analysis,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_fields() {
        let prompt = analysis(&AnalysisFields {
            query: "러스트란?",
            keywords: "ownership, borrow",
            search_result: "Rust is a language.",
        });
        assert!(prompt.contains("질문: 러스트란?\n"));
        assert!(prompt.contains("키워드: ownership, borrow\n"));
        assert!(prompt.contains("검색 결과:\nRust is a language.\n"));
        assert!(prompt.ends_with("요약:\n"));
    }

    #[test]
    fn test_decision_format_lines() {
        let prompt = decision(&DecisionFields {
            query: "q",
            current_analysis: "\n반복 1 분석:\nfoo\n",
        });
        assert!(prompt.contains("현재까지의 분석: \n반복 1 분석:\nfoo\n"));
        assert!(prompt.contains("\n필요여부: [Yes/No]\n"));
        assert!(prompt.contains("불필요한 경우 \"없음\"]"));
        assert!(prompt.ends_with("결정:\n"));
    }

    #[test]
    fn test_synthesis_fields() {
        let prompt = synthesis(&SynthesisFields {
            query: "q",
            full_analysis: "A then B",
        });
        assert!(prompt.contains("질문: q\n전체 분석 내용: A then B\n"));
        assert!(prompt.ends_with("최종 응답:\n"));
    }

    #[test]
    fn test_braces_in_fields_are_literal() {
        let prompt = synthesis(&SynthesisFields {
            query: "{query}",
            full_analysis: "{}",
        });
        assert!(prompt.contains("질문: {query}\n전체 분석 내용: {}\n"));
    }
}
