//! 治疗目录、治疗方案与评估结果数据结构

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 治疗目录（类别 key → 类别）
///
/// 有的类别直接挂 items（如 режим / 饮食），有的挂 subcategories → items
/// （如抗生素按药物分组），两种结构都要兼容。
pub type TreatmentCatalog = BTreeMap<String, TreatmentCategory>;

#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentCategory {
    pub name: String,
    #[serde(default)]
    pub items: BTreeMap<String, TreatmentItem>,
    #[serde(default)]
    pub subcategories: BTreeMap<String, TreatmentSubcategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentSubcategory {
    pub name: String,
    #[serde(default)]
    pub items: BTreeMap<String, TreatmentItem>,
}

/// 目录中的单个条目（药物 / 饮食 / 非药物措施）
#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentItem {
    #[serde(deserialize_with = "crate::models::flexible_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dose: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// 在目录中按 id 查找条目（两层结构都找）
pub fn find_item<'a>(catalog: &'a TreatmentCatalog, item_id: &str) -> Option<&'a TreatmentItem> {
    for category in catalog.values() {
        if let Some(item) = category.items.values().find(|i| i.id == item_id) {
            return Some(item);
        }
        for subcategory in category.subcategories.values() {
            if let Some(item) = subcategory.items.values().find(|i| i.id == item_id) {
                return Some(item);
            }
        }
    }
    None
}

/// 处方中的一个药物（剂量等字段学生可改）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub dose: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub route: String,
}

impl Medication {
    /// 从目录条目创建处方药物，预填目录中的推荐剂量
    pub fn from_item(item: &TreatmentItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            dose: item.dose.clone().unwrap_or_default(),
            frequency: item.frequency.clone().unwrap_or_default(),
            duration: item.duration.clone().unwrap_or_default(),
            route: item.route.clone().unwrap_or_else(|| "oral".to_string()),
        }
    }
}

/// 治疗方案草稿
///
/// 饮食和非药物措施只存目录 id，发给检查接口时换成名称。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub regime: Option<String>,
    pub medications: Vec<Medication>,
    pub diet: Vec<String>,
    pub non_medication: Vec<String>,
}

impl TreatmentPlan {
    /// 发给治疗检查接口的格式（id → 名称，目录里找不到就原样发 id）
    pub fn to_check_wire(&self, catalog: &TreatmentCatalog) -> JsonValue {
        let resolve = |id: &String| -> String {
            find_item(catalog, id)
                .map(|item| item.name.clone())
                .unwrap_or_else(|| id.clone())
        };
        json!({
            "regime": self.regime,
            "medications": self.medications,
            "diet": self.diet.iter().map(&resolve).collect::<Vec<_>>(),
            "nonMedication": self.non_medication.iter().map(&resolve).collect::<Vec<_>>(),
        })
    }

    /// 发给草稿/完成接口的格式（保留 id）
    pub fn to_wire(&self) -> JsonValue {
        json!({
            "regime": self.regime,
            "medications": self.medications,
            "diet": self.diet,
            "nonMedication": self.non_medication,
        })
    }
}

/// 诊断结论（学生填写）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnosis {
    pub main: String,
    pub code: String,
    pub complications: String,
    pub comorbidities: String,
}

/// 观察计划（检查通过后填写）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub control_visit: String,
    pub control_tests: Vec<String>,
    pub recovery_criteria: Vec<String>,
}

impl Default for Observation {
    fn default() -> Self {
        Self {
            control_visit: "3".to_string(),
            control_tests: Vec::new(),
            recovery_criteria: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Referral {
    pub specialist: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SickLeave {
    pub issue: bool,
    pub days: String,
}

impl Default for SickLeave {
    fn default() -> Self {
        Self {
            issue: true,
            days: "5".to_string(),
        }
    }
}

/// 检查结果中的单条发现
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFinding {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub correction: Option<String>,
}

/// "正确项"有时是字符串有时是 {item: ...} 对象
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectEntry {
    Text(String),
    Item { item: String },
}

impl CorrectEntry {
    pub fn text(&self) -> &str {
        match self {
            CorrectEntry::Text(s) => s,
            CorrectEntry::Item { item } => item,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Compliance {
    #[serde(default)]
    pub errors: Vec<CheckFinding>,
    #[serde(default)]
    pub warnings: Vec<CheckFinding>,
    #[serde(default)]
    pub correct: Vec<CorrectEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    #[serde(rename = "errorsCount", default)]
    pub errors_count: u32,
    #[serde(rename = "warningsCount", default)]
    pub warnings_count: u32,
    #[serde(rename = "correctCount", default)]
    pub correct_count: u32,
}

/// 治疗检查接口的响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentCheck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub compliance: Compliance,
    #[serde(default)]
    pub summary: Option<CheckSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 完成病例后的基础评估
#[derive(Debug, Clone, Deserialize)]
pub struct CaseEvaluation {
    #[serde(default)]
    pub score: i64,
    #[serde(rename = "maxScore", default = "default_max_score")]
    pub max_score: i64,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(rename = "correctActions", default)]
    pub correct_actions: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(rename = "criticalErrors", default)]
    pub critical_errors: Vec<String>,
    #[serde(rename = "userDiagnosis", default)]
    pub user_diagnosis: Option<String>,
    /// 参考治疗协议 / 费用模块，结构不稳定，原样保留
    #[serde(default)]
    pub protocol: Option<JsonValue>,
    #[serde(default)]
    pub economics: Option<JsonValue>,
}

fn default_max_score() -> i64 {
    100
}

impl Default for CaseEvaluation {
    fn default() -> Self {
        Self {
            score: 0,
            max_score: 100,
            feedback: None,
            correct_actions: Vec::new(),
            improvements: Vec::new(),
            critical_errors: Vec::new(),
            user_diagnosis: None,
            protocol: None,
            economics: None,
        }
    }
}

/// 最终结果：基础评估 + 可选的 AI 分析
///
/// AI 分析拿不到时退化成只有基础评估。
#[derive(Debug, Clone, Default)]
pub struct CaseReport {
    pub evaluation: CaseEvaluation,
    pub ai_analysis: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_JSON: &str = r#"{
        "regime": {
            "name": "Режим",
            "items": {
                "home": {"id": "regime_home", "name": "Домашний режим", "description": ""}
            }
        },
        "antibiotics": {
            "name": "Антибиотики",
            "subcategories": {
                "fluoroquinolones": {
                    "name": "Фторхинолоны",
                    "items": {
                        "cipro": {"id": "med_cipro", "name": "Ципрофлоксацин", "dose": "500 мг", "cost": 1200}
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_find_item_in_both_layouts() {
        let catalog: TreatmentCatalog = serde_json::from_str(CATALOG_JSON).unwrap();
        assert_eq!(find_item(&catalog, "regime_home").unwrap().name, "Домашний режим");
        assert_eq!(find_item(&catalog, "med_cipro").unwrap().dose.as_deref(), Some("500 мг"));
        assert!(find_item(&catalog, "missing").is_none());
    }

    #[test]
    fn test_check_wire_resolves_names() {
        let catalog: TreatmentCatalog = serde_json::from_str(CATALOG_JSON).unwrap();
        let plan = TreatmentPlan {
            regime: Some("regime_home".to_string()),
            medications: vec![Medication::from_item(find_item(&catalog, "med_cipro").unwrap())],
            diet: vec!["regime_home".to_string(), "unknown_diet".to_string()],
            non_medication: Vec::new(),
        };
        let wire = plan.to_check_wire(&catalog);
        assert_eq!(wire["diet"][0], "Домашний режим");
        // 目录里找不到的 id 原样透传
        assert_eq!(wire["diet"][1], "unknown_diet");
        assert_eq!(wire["medications"][0]["name"], "Ципрофлоксацин");
    }

    #[test]
    fn test_correct_entry_both_shapes() {
        let compliance: Compliance = serde_json::from_str(
            r#"{"correct": ["Режим выбран верно", {"item": "Диета №4"}]}"#,
        )
        .unwrap();
        assert_eq!(compliance.correct[0].text(), "Режим выбран верно");
        assert_eq!(compliance.correct[1].text(), "Диета №4");
    }

    #[test]
    fn test_evaluation_defaults() {
        let eval: CaseEvaluation = serde_json::from_str(r#"{"score": 62}"#).unwrap();
        assert_eq!(eval.score, 62);
        assert_eq!(eval.max_score, 100);
        assert!(eval.critical_errors.is_empty());
    }
}
