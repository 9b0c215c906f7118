/// CAS（Compare-And-Swap）操作最大重试次数
pub const MAX_CAS_RETRIES: u32 = 20;

/// 题干文本最大长度
pub const MAX_QUESTION_TEXT_LEN: usize = 2000;

/// 选项数量下限
pub const MIN_OPTIONS: usize = 2;

/// 选项数量上限
pub const MAX_OPTIONS: usize = 8;

/// 单个选项最大长度
pub const MAX_OPTION_LEN: usize = 500;

/// 每题概念标签数量上限
pub const MAX_CONCEPT_TAGS: usize = 8;

/// 单个概念标签最大长度
pub const MAX_TAG_LEN: usize = 120;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// 批次历史查询默认返回条数
pub const DEFAULT_BATCH_HISTORY_LIMIT: usize = 10;

/// 批次历史查询最大返回条数
pub const MAX_BATCH_HISTORY_LIMIT: usize = 50;
