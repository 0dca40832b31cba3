//! 病例与问诊数据结构

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 病例列表项
#[derive(Debug, Clone, Deserialize)]
pub struct CaseSummary {
    #[serde(deserialize_with = "crate::models::flexible_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// 病例详情
///
/// 后端返回的字段并不稳定，所有字段按可缺省处理。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseInfo {
    #[serde(default, deserialize_with = "crate::models::flexible_opt_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::models::flexible_opt_string")]
    pub age: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "additionalInfo")]
    pub additional_info: Vec<String>,
    #[serde(default, rename = "examinationFindings")]
    pub examination_findings: Option<String>,
    #[serde(default, rename = "correctDiagnosis")]
    pub correct_diagnosis: Option<String>,
}

impl CaseInfo {
    /// 提取患者年龄
    ///
    /// 优先使用 age 字段；没有就从描述中找 "N лет/год"；再不行按成年人处理。
    pub fn extracted_age(&self) -> String {
        if let Some(age) = &self.age {
            return age.clone();
        }
        if let Some(description) = &self.description {
            if let Ok(re) = Regex::new(r"(\d+)\s*(лет|год)") {
                if let Some(cap) = re.captures(description) {
                    return cap[1].to_string();
                }
            }
        }
        "взрослый".to_string()
    }
}

/// 对话角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// 医生（学生）
    Doctor,
    /// AI 患者
    Patient,
}

impl ChatRole {
    /// 发给后端的 sender 字段：医生是 "user"，患者是 "patient"
    pub fn wire_sender(self) -> &'static str {
        match self {
            ChatRole::Doctor => "user",
            ChatRole::Patient => "patient",
        }
    }
}

/// 一条对话消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn doctor(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Doctor,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn patient(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Patient,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// 转成发给 /api/chat 和 /api/analysis 的历史格式
    pub fn to_wire(&self) -> JsonValue {
        json!({
            "sender": self.role.wire_sender(),
            "text": self.text,
        })
    }
}

/// 把完整对话记录转成发给后端的历史数组
pub fn history_to_wire(history: &[ChatMessage]) -> Vec<JsonValue> {
    history.iter().map(ChatMessage::to_wire).collect()
}

/// 问诊中收集到的信息类别
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedInfo {
    pub complaints: bool,
    pub anamnesis: bool,
    pub epidemiology: bool,
    pub allergies: bool,
    pub chronic_diseases: bool,
}

/// 问诊进度
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterviewProgress {
    pub questions_count: usize,
    pub collected: CollectedInfo,
}

impl InterviewProgress {
    /// 记录一轮问答并更新信息收集标记
    ///
    /// 关键词匹配针对医生提问的原文（平台面向俄语/哈萨克语学生）。
    pub fn register_exchange(&mut self, question: &str) {
        self.questions_count += 1;

        let q = question.to_lowercase();
        if q.contains("беспокоит") || q.contains("жалоб") {
            self.collected.complaints = true;
        }
        if q.contains("начал") || q.contains("когда") {
            self.collected.anamnesis = true;
        }
        if q.contains("ел") || q.contains("пил") || q.contains("еда") {
            self.collected.epidemiology = true;
        }
        if q.contains("аллерг") || q.contains("непереносим") {
            self.collected.allergies = true;
        }
        if q.contains("хроническ") || q.contains("болеет") {
            self.collected.chronic_diseases = true;
        }
    }

    /// 发给完成/分析接口的进度对象
    pub fn to_wire(&self) -> JsonValue {
        json!({
            "questionsCount": self.questions_count,
            "collected": {
                "complaints": self.collected.complaints,
                "anamnesis": self.collected.anamnesis,
                "epidemiology": self.collected.epidemiology,
                "allergies": self.collected.allergies,
                "chronicDiseases": self.collected.chronic_diseases,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_info_defensive_deserialization() {
        // id 是数字、大部分字段缺失也要能解析
        let case: CaseInfo = serde_json::from_str(
            r#"{"id": 7, "title": "Сальмонеллёз", "symptoms": ["лихорадка", "диарея"]}"#,
        )
        .unwrap();
        assert_eq!(case.id.as_deref(), Some("7"));
        assert_eq!(case.symptoms.len(), 2);
        assert!(case.correct_diagnosis.is_none());
    }

    #[test]
    fn test_extracted_age_from_description() {
        let case = CaseInfo {
            description: Some("Пациент 34 лет жалуется на боль в животе".to_string()),
            ..Default::default()
        };
        assert_eq!(case.extracted_age(), "34");

        let unknown = CaseInfo::default();
        assert_eq!(unknown.extracted_age(), "взрослый");
    }

    #[test]
    fn test_wire_history_roles() {
        let history = vec![
            ChatMessage::doctor("Что вас беспокоит?"),
            ChatMessage::patient("Болит живот."),
        ];
        let wire = history_to_wire(&history);
        assert_eq!(wire[0]["sender"], "user");
        assert_eq!(wire[1]["sender"], "patient");
    }

    #[test]
    fn test_register_exchange_flags() {
        let mut progress = InterviewProgress::default();
        progress.register_exchange("Что вас беспокоит?");
        progress.register_exchange("Когда это началось?");
        progress.register_exchange("Есть ли аллергия на лекарства?");

        assert_eq!(progress.questions_count, 3);
        assert!(progress.collected.complaints);
        assert!(progress.collected.anamnesis);
        assert!(progress.collected.allergies);
        assert!(!progress.collected.chronic_diseases);
    }
}
