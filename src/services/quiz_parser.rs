//! 题库文件解析 - 业务能力层
//!
//! 把从文档里抽出来的纯文本变成结构化题目序列。
//!
//! 这类文件没有正式语法（各院校导出的测试转储格式五花八门），
//! 解析按行分类，用显式状态机表达，方便单独审查歧义行的归类规则：
//!
//! - `SeekingQuestion`：还没遇到题目行，其他内容一律跳过
//! - `CollectingQuestionText`：题目已开始、选项还没出现，较长的行并入题干
//! - `CollectingOptions`：第一个选项出现之后，无标记的短行当作额外选项
//!
//! "题干续行"和"无标记选项"之间的歧义完全由"当前题目是否已有选项"决定。

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::models::quiz::{Question, QuizOption};

/// 自动分配的选项字母表，超出后退化为数字
const LETTERS: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

/// 正确答案标记字符
const MARKERS: &[char] = &['+', '＋', '✓', '✔'];

/// 解析器状态
enum ParserState {
    /// 还没有遇到题目行
    SeekingQuestion,
    /// 正在收集题干（还没有选项）
    CollectingQuestionText(Question),
    /// 正在收集选项
    CollectingOptions(Question),
}

/// 题库文本解析器
pub struct QuizParser {
    /// 题目行: "1. 题干至少十个字符……" 或 "1) ……"
    re_question: Regex,
    /// 标准选项: "[+]A) 文本"（拉丁 A-E 或西里尔 А-Д）
    re_standard: Regex,
    /// 编码选项: "[+]021/ү"、"003-5/у" 这类检验单编号
    re_code: Regex,
}

impl QuizParser {
    pub fn new() -> Self {
        Self {
            re_question: Regex::new(r"^(\d+)[.)]\s+(.{10,})$").expect("question regex"),
            re_standard: Regex::new(r"(?i)^([+＋✓✔])?\s*([A-Ea-eА-Да-д])\s*[).:\-]\s*(.+)$")
                .expect("standard option regex"),
            re_code: Regex::new(
                r"(?i)^([+＋✓✔])?\s*(\d{2,}[-/\d]*/?[\wа-яёәғқңөұүһіА-ЯӘҒҚҢӨҰҮҺІ]{0,2})$",
            )
            .expect("code option regex"),
        }
    }

    /// 解析 .txt 题库文件
    pub fn parse_file(&self, path: &Path) -> Result<Vec<Question>> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "txt" {
            return Err(ParseError::UnsupportedFormat { ext }.into());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取题库文件: {}", path.display()))?;

        let questions = self.parse(&text)?;
        Ok(questions)
    }

    /// 解析题库文本
    ///
    /// # 返回
    /// 全部题目。任何一道题缺少正确答案标记时整体失败，
    /// 不返回部分结果，错误里列出有问题的题号。
    pub fn parse(&self, text: &str) -> Result<Vec<Question>, ParseError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        debug!("📄 解析题库文本，共 {} 个非空行", lines.len());

        let mut questions: Vec<Question> = Vec::new();
        let mut state = ParserState::SeekingQuestion;

        for line in lines {
            state = self.step(state, line, &mut questions);
        }

        // 收尾：最后一道题有选项才保留
        match state {
            ParserState::CollectingQuestionText(q) | ParserState::CollectingOptions(q) => {
                if !q.options.is_empty() {
                    questions.push(q);
                }
            }
            ParserState::SeekingQuestion => {}
        }

        if questions.is_empty() {
            return Err(ParseError::NoQuestionsFound);
        }

        // 快速失败：没有正确答案的题目直接让整次导入失败
        let invalid: Vec<u32> = questions
            .iter()
            .filter(|q| !q.has_correct_option())
            .map(|q| q.id)
            .collect();
        if !invalid.is_empty() {
            return Err(ParseError::MissingCorrectAnswers {
                question_ids: invalid,
            });
        }

        info!("✓ 共解析出 {} 道题目", questions.len());
        Ok(questions)
    }

    /// 处理一行，返回新状态
    fn step(&self, state: ParserState, line: &str, out: &mut Vec<Question>) -> ParserState {
        // 题目行在任何状态下都优先：结束上一道题、开始新题
        if let Some(caps) = self.re_question.captures(line) {
            match state {
                ParserState::CollectingQuestionText(q) | ParserState::CollectingOptions(q) => {
                    // 一个选项都没有的题目被丢弃
                    if !q.options.is_empty() {
                        out.push(q);
                    }
                }
                ParserState::SeekingQuestion => {}
            }

            let question = Question {
                id: out.len() as u32 + 1,
                text: caps[2].to_string(),
                options: Vec::new(),
            };
            debug!("📝 题目 {}: {}", question.id, preview(&question.text));
            return ParserState::CollectingQuestionText(question);
        }

        match state {
            ParserState::SeekingQuestion => ParserState::SeekingQuestion,

            ParserState::CollectingQuestionText(mut q) => {
                if let Some(option) = self.classify_option(line, q.options.len()) {
                    debug!("  选项 {}: {}", option.letter, preview(&option.text));
                    q.options.push(option);
                    ParserState::CollectingOptions(q)
                } else if char_len(line) > 5 {
                    // 选项出现之前，较长的行都算题干续行
                    q.text.push(' ');
                    q.text.push_str(line);
                    ParserState::CollectingQuestionText(q)
                } else {
                    ParserState::CollectingQuestionText(q)
                }
            }

            ParserState::CollectingOptions(mut q) => {
                if let Some(option) = self.classify_option(line, q.options.len()) {
                    debug!("  选项 {}: {}", option.letter, preview(&option.text));
                    q.options.push(option);
                } else {
                    let len = char_len(line);
                    // 选项已经开始之后，无标记的短行当作一个（不正确的）选项。
                    // 这条规则会把恰好较短的题干续行误认成选项，是这种
                    // 无语法格式固有的歧义，归类规则以"是否已有选项"为准。
                    if len > 5 && len < 100 {
                        let option = QuizOption {
                            letter: fallback_letter(q.options.len()),
                            text: line.to_string(),
                            is_correct: false,
                            original_index: q.options.len(),
                        };
                        debug!("  选项 {}: {}", option.letter, preview(&option.text));
                        q.options.push(option);
                    }
                }
                ParserState::CollectingOptions(q)
            }
        }
    }

    /// 尝试把一行解析成选项
    ///
    /// 依次匹配：标准 "字母)" 格式 → 编号格式 → 带标记的自由文本。
    fn classify_option(&self, line: &str, existing: usize) -> Option<QuizOption> {
        if let Some(caps) = self.re_standard.captures(line) {
            return Some(QuizOption {
                letter: caps[2].to_uppercase(),
                text: caps[3].to_string(),
                is_correct: caps.get(1).is_some(),
                original_index: existing,
            });
        }

        if let Some(caps) = self.re_code.captures(line) {
            return Some(QuizOption {
                letter: fallback_letter(existing),
                text: caps[2].to_string(),
                is_correct: caps.get(1).is_some(),
                original_index: existing,
            });
        }

        // 带标记但不符合上面两种格式的行：整行（去掉标记）是正确答案
        if line.starts_with(MARKERS) && char_len(line) > 3 {
            let text = line
                .trim_start_matches(MARKERS)
                .trim_start()
                .to_string();
            return Some(QuizOption {
                letter: fallback_letter(existing),
                text,
                is_correct: true,
                original_index: existing,
            });
        }

        None
    }
}

impl Default for QuizParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 按已有选项数量分配字母
fn fallback_letter(index: usize) -> String {
    LETTERS
        .get(index)
        .map(|s| s.to_string())
        .unwrap_or_else(|| (index + 1).to_string())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        text.chars().take(50).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<Question>, ParseError> {
        QuizParser::new().parse(text)
    }

    #[test]
    fn test_standard_format() {
        let questions = parse("1. What is X?\nA) foo\n+B) bar\nC) baz").unwrap();
        assert_eq!(questions.len(), 1);

        let q = &questions[0];
        assert_eq!(q.text, "What is X?");
        assert_eq!(q.options.len(), 3);
        assert!(!q.options[0].is_correct);
        assert!(q.options[1].is_correct);
        assert!(!q.options[2].is_correct);
        assert_eq!(q.options[1].letter, "B");
    }

    #[test]
    fn test_exactly_the_options_present() {
        let questions = parse(
            "1. Какой симптом характерен для аппендицита?\n\
             A) Симптом Кернига\n\
             +B) Симптом Щеткина-Блюмберга\n\
             \n\
             2. Какая диета назначается при сальмонеллёзе?\n\
             +A) Диета №4\n\
             B) Диета №9\n\
             C) Диета №15",
        )
        .unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options.len(), 2);
        assert_eq!(questions[1].options.len(), 3);
        assert_eq!(questions[0].id, 1);
        assert_eq!(questions[1].id, 2);
    }

    #[test]
    fn test_code_options_get_sequential_letters() {
        let questions = parse(
            "1. Какой формой учетной документации оформляется направление?\n\
             003-5/у\n\
             +021/ty\n\
             027/у",
        )
        .unwrap();
        let q = &questions[0];
        assert_eq!(q.options.len(), 3);
        assert_eq!(q.options[0].letter, "A");
        assert_eq!(q.options[1].letter, "B");
        assert_eq!(q.options[2].letter, "C");
        assert!(q.options[1].is_correct);
        assert_eq!(q.options[1].text, "021/ty");
    }

    #[test]
    fn test_bare_marked_line_is_correct_free_text() {
        let questions = parse(
            "1. Перечислите основные пути передачи инфекции?\n\
             ✓ фекально-оральный путь\n\
             воздушно-капельный путь",
        )
        .unwrap();
        let q = &questions[0];
        assert_eq!(q.options.len(), 2);
        assert!(q.options[0].is_correct);
        assert_eq!(q.options[0].text, "фекально-оральный путь");
        // 选项开始后的无标记短行是额外的不正确选项
        assert!(!q.options[1].is_correct);
    }

    #[test]
    fn test_question_text_continuation_before_options() {
        let questions = parse(
            "1. Пациент 45 лет поступил с жалобами\n\
             на повышение температуры и многократную рвоту.\n\
             Какой диагноз наиболее вероятен?\n\
             +A) Сальмонеллёз\n\
             B) Дизентерия",
        )
        .unwrap();
        let q = &questions[0];
        assert!(q.text.contains("многократную рвоту"));
        assert!(q.text.contains("Какой диагноз"));
        assert_eq!(q.options.len(), 2);
    }

    #[test]
    fn test_missing_correct_marker_fails_with_question_number() {
        let err = parse(
            "1. Вопрос с правильным ответом, длинный?\n\
             +A) да\n\
             B) нет\n\
             2. Вопрос без правильного ответа, длинный?\n\
             A) один\n\
             B) два",
        )
        .unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingCorrectAnswers {
                question_ids: vec![2]
            }
        );
        // 错误信息里能看到题号
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(parse("").unwrap_err(), ParseError::NoQuestionsFound);
        assert_eq!(
            parse("просто текст без номеров").unwrap_err(),
            ParseError::NoQuestionsFound
        );
    }

    #[test]
    fn test_question_without_options_is_dropped() {
        let questions = parse(
            "1. Первый вопрос остался без вариантов ответа?\n\
             2. Второй вопрос с вариантами ответов, да?\n\
             +A) верно\n\
             B) неверно",
        )
        .unwrap();
        // 第一道题被丢弃，第二道顶替它的编号
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, 1);
        assert!(questions[0].text.starts_with("Второй"));
    }

    #[test]
    fn test_short_question_line_does_not_start_question() {
        // 编号后不足十个字符的行不是题目
        let err = parse("1. коротко\n+A) да").unwrap_err();
        assert_eq!(err, ParseError::NoQuestionsFound);
    }

    #[test]
    fn test_cyrillic_option_letters_uppercased() {
        let questions = parse(
            "1. Қандай жауап дұрыс болып табылады?\n\
             а) бірінші\n\
             +б) екінші",
        )
        .unwrap();
        let q = &questions[0];
        assert_eq!(q.options[0].letter, "А");
        assert_eq!(q.options[1].letter, "Б");
        assert!(q.options[1].is_correct);
    }

    #[test]
    fn test_marker_variants() {
        for marker in ['+', '＋', '✓', '✔'] {
            let text = format!("1. Вопрос про маркеры правильного ответа?\nA) нет\n{}B) да", marker);
            let questions = parse(&text).unwrap();
            assert!(questions[0].options[1].is_correct, "marker {:?}", marker);
        }
    }
}
