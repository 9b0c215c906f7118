/// 公共验证函数模块
/// 题库写入与生成层边界共用的问题结构校验。

use crate::constants::{
    MAX_CONCEPT_TAGS, MAX_OPTIONS, MAX_OPTION_LEN, MAX_QUESTION_TEXT_LEN, MAX_TAG_LEN,
    MIN_OPTIONS,
};

/// 验证题干：非空白、长度受限
pub fn validate_question_text(text: &str) -> Result<(), &'static str> {
    if text.trim().is_empty() {
        return Err("question text must not be empty");
    }
    if text.chars().count() > MAX_QUESTION_TEXT_LEN {
        return Err("question text is too long");
    }
    Ok(())
}

/// 验证选项集合：数量在范围内、非空白、无重复
pub fn validate_options(options: &[String]) -> Result<(), &'static str> {
    if options.len() < MIN_OPTIONS {
        return Err("a question needs at least two options");
    }
    if options.len() > MAX_OPTIONS {
        return Err("too many options");
    }
    let mut seen = std::collections::HashSet::new();
    for option in options {
        if option.trim().is_empty() {
            return Err("options must not be blank");
        }
        if option.chars().count() > MAX_OPTION_LEN {
            return Err("option text is too long");
        }
        if !seen.insert(option.trim()) {
            return Err("options must be distinct");
        }
    }
    Ok(())
}

/// 正确答案必须是选项之一
pub fn validate_correct_answer(options: &[String], correct_answer: &str) -> Result<(), &'static str> {
    if options.iter().any(|o| o == correct_answer) {
        Ok(())
    } else {
        Err("correct answer must be one of the options")
    }
}

/// 验证概念标签：至少一个非空白标签，数量与长度受限
pub fn validate_concept_tags(tags: &[String]) -> Result<(), &'static str> {
    if tags.is_empty() {
        return Err("a question needs at least one concept tag");
    }
    if tags.len() > MAX_CONCEPT_TAGS {
        return Err("too many concept tags");
    }
    for tag in tags {
        if tag.trim().is_empty() {
            return Err("concept tags must not be blank");
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err("concept tag is too long");
        }
    }
    Ok(())
}

/// 生成层边界的整体结构校验（生成候选暂无标签，标签由目标概念决定）
pub fn validate_candidate(
    text: &str,
    options: &[String],
    correct_answer: &str,
) -> Result<(), &'static str> {
    validate_question_text(text)?;
    validate_options(options)?;
    validate_correct_answer(options, correct_answer)
}
