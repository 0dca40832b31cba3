//! 会话语言检测 - 业务能力层
//!
//! 平台同时服务哈萨克语、俄语和英语学生，后端按语言生成患者回答。
//! 从第一条医生消息判断语言，之后整个会话固定不变。

/// 哈萨克语特有字母（俄语西里尔字母表之外的部分）
const KAZAKH_LETTERS: &[char] = &[
    'ғ', 'қ', 'ң', 'ө', 'ү', 'һ', 'і', 'Ғ', 'Қ', 'Ң', 'Ө', 'Ү', 'Һ', 'І',
];

/// 检测文本语言
///
/// 含哈萨克语特有字母 → "kk"，含西里尔字母 → "ru"，其余 → "en"。
pub fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| KAZAKH_LETTERS.contains(&c)) {
        return "kk";
    }

    let has_cyrillic = text
        .chars()
        .any(|c| ('а'..='я').contains(&c) || ('А'..='Я').contains(&c) || c == 'ё' || c == 'Ё');
    if has_cyrillic {
        return "ru";
    }

    "en"
}
