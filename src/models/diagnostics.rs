//! 诊断目录与模拟结果数据结构
//!
//! 目录由后端下发：类别 → 子类别 → 检查项目。

use std::collections::BTreeMap;

use serde::Deserialize;

/// 诊断目录（类别 key → 类别）
pub type DiagnosticCatalog = BTreeMap<String, DiagnosticCategory>;

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticCategory {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub subcategories: BTreeMap<String, DiagnosticSubcategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticSubcategory {
    pub name: String,
    #[serde(default)]
    pub tests: Vec<DiagnosticTest>,
}

/// 单个检查项目
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosticTest {
    #[serde(deserialize_with = "crate::models::flexible_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 出结果所需时间（分钟），0 或缺省表示即时
    #[serde(default)]
    pub time_minutes: Option<u32>,
}

/// 在目录中按 id 查找检查项目
pub fn find_test<'a>(catalog: &'a DiagnosticCatalog, test_id: &str) -> Option<&'a DiagnosticTest> {
    for category in catalog.values() {
        for subcategory in category.subcategories.values() {
            if let Some(test) = subcategory.tests.iter().find(|t| t.id == test_id) {
                return Some(test);
            }
        }
    }
    None
}

/// 检查项目的单项指标值
#[derive(Debug, Clone, Deserialize)]
pub struct MeasuredValue {
    pub name: String,
    #[serde(deserialize_with = "crate::models::flexible_string")]
    pub value: String,
    #[serde(default)]
    pub unit: String,
    /// normal / high / low
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// 单个检查项目的结果
#[derive(Debug, Clone, Deserialize)]
pub struct TestOutcome {
    #[serde(rename = "testName", default)]
    pub test_name: String,
    #[serde(default)]
    pub values: Vec<MeasuredValue>,
    #[serde(default)]
    pub interpretation: Option<String>,
}

/// 诊断假设
#[derive(Debug, Clone, Deserialize)]
pub struct DiagnosisHypothesis {
    pub diagnosis: String,
    #[serde(default)]
    pub probability: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// AI 对检查选择的结构化分析
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiagnosticAnalysis {
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub correct: Vec<String>,
    #[serde(default)]
    pub missing: Vec<String>,
    #[serde(default)]
    pub excessive: Vec<String>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisHypothesis>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// 诊断模拟接口的完整响应
///
/// 原始结果值和结构化分析都保留，带入治疗阶段。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationReport {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: BTreeMap<String, TestOutcome>,
    #[serde(default)]
    pub analysis: Option<DiagnosticAnalysis>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_JSON: &str = r#"{
        "laboratory": {
            "name": "🧪 Лабораторные",
            "icon": "🧪",
            "subcategories": {
                "blood": {
                    "name": "Анализы крови",
                    "tests": [
                        {"id": "cbc", "name": "ОАК", "description": "Общий анализ крови", "time_minutes": 30},
                        {"id": "crp", "name": "СРБ"}
                    ]
                }
            }
        },
        "instrumental": {
            "name": "🏥 Инструментальные",
            "subcategories": {}
        }
    }"#;

    #[test]
    fn test_catalog_deserialization() {
        let catalog: DiagnosticCatalog = serde_json::from_str(CATALOG_JSON).unwrap();
        assert_eq!(catalog.len(), 2);
        let blood = &catalog["laboratory"].subcategories["blood"];
        assert_eq!(blood.tests.len(), 2);
        // description / time_minutes 缺省也能解析
        assert_eq!(blood.tests[1].description, "");
        assert!(blood.tests[1].time_minutes.is_none());
    }

    #[test]
    fn test_find_test() {
        let catalog: DiagnosticCatalog = serde_json::from_str(CATALOG_JSON).unwrap();
        assert_eq!(find_test(&catalog, "crp").unwrap().name, "СРБ");
        assert!(find_test(&catalog, "mri").is_none());
    }

    #[test]
    fn test_simulation_report_defensive() {
        let report: SimulationReport = serde_json::from_str(
            r#"{
                "success": true,
                "results": {
                    "cbc": {
                        "testName": "ОАК",
                        "values": [
                            {"name": "Лейкоциты", "value": 14.2, "unit": "10^9/л", "status": "high", "reference": "4-9"}
                        ],
                        "interpretation": "Лейкоцитоз"
                    }
                },
                "analysis": {"score": 75, "correct": ["ОАК"], "diagnoses": [{"diagnosis": "Сальмонеллёз", "probability": "высокая"}]}
            }"#,
        )
        .unwrap();
        assert!(report.success);
        // 数字类型的 value 被拉平成字符串
        assert_eq!(report.results["cbc"].values[0].value, "14.2");
        assert_eq!(report.analysis.unwrap().score, Some(75));
    }
}
