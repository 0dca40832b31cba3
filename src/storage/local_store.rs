//! 本地状态存储
//!
//! 状态目录下一个键一个 JSON 文件：令牌、用户缓存、按病例的对话记录、
//! 界面偏好、测试历史。写入是尽力而为的镜像，不做事务保证；
//! 读取失败一律降级为默认值并记一条警告，不让主流程崩溃。

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::case::ChatMessage;
use crate::models::quiz::QuizReport;
use crate::models::user::User;

/// 界面偏好
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// 主题（dark / light）
    pub theme: String,
    /// 界面语言（kk / ru / en）
    pub language: String,
    /// 背景音乐开关
    pub music_enabled: bool,
    /// 背景音乐音量（0.0 - 1.0）
    pub music_volume: f32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            language: "ru".to_string(),
            music_enabled: false,
            music_volume: 0.5,
        }
    }
}

/// 本地状态存储
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// 打开（必要时创建）状态目录
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("无法创建状态目录: {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// 读取一个键，文件缺失或损坏都返回 None
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.key_path(key);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return None,
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("本地状态 {} 损坏，按空值处理: {}", key, e);
                None
            }
        }
    }

    /// 写入一个键（尽力而为：失败记警告，不向上传播）
    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let path = self.key_path(key);
        let result = serde_json::to_string_pretty(value)
            .map_err(anyhow::Error::from)
            .and_then(|json| fs::write(&path, json).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!("写入本地状态 {} 失败: {}", key, e);
        } else {
            debug!("本地状态已写入: {}", key);
        }
    }

    /// 删除一个键
    pub fn remove(&self, key: &str) {
        let path = self.key_path(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("删除本地状态 {} 失败: {}", key, e);
            }
        }
    }

    // ========== 认证 ==========

    pub fn load_token(&self) -> Option<String> {
        self.read("auth_token")
    }

    pub fn save_token(&self, token: &str) {
        self.write("auth_token", &token);
    }

    pub fn load_user(&self) -> Option<User> {
        self.read("user")
    }

    pub fn save_user(&self, user: &User) {
        self.write("user", user);
    }

    /// 登出：清掉令牌和用户缓存
    pub fn clear_auth(&self) {
        self.remove("auth_token");
        self.remove("user");
    }

    // ========== 对话记录（按病例） ==========

    fn conversation_key(case_id: &str) -> String {
        // 病例 id 来自后端，落盘前把路径相关字符清掉
        let safe: String = case_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("conversation_{}", safe)
    }

    pub fn load_conversation(&self, case_id: &str) -> Vec<ChatMessage> {
        self.read(&Self::conversation_key(case_id)).unwrap_or_default()
    }

    pub fn save_conversation(&self, case_id: &str, history: &[ChatMessage]) {
        self.write(&Self::conversation_key(case_id), &history);
    }

    pub fn clear_conversation(&self, case_id: &str) {
        self.remove(&Self::conversation_key(case_id));
    }

    // ========== 偏好 ==========

    pub fn load_preferences(&self) -> Preferences {
        self.read("preferences").unwrap_or_default()
    }

    pub fn save_preferences(&self, prefs: &Preferences) {
        self.write("preferences", prefs);
    }

    // ========== 测试历史 ==========

    pub fn load_quiz_history(&self) -> Vec<QuizReport> {
        self.read("gentest_history").unwrap_or_default()
    }

    /// 把新报告插到最前面，只保留最近 limit 条
    pub fn push_quiz_report(&self, report: QuizReport, limit: usize) {
        let mut history = self.load_quiz_history();
        history.insert(0, report);
        history.truncate(limit);
        self.write("gentest_history", &history);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quiz::QuizMode;
    use chrono::Utc;

    fn temp_store(name: &str) -> LocalStore {
        let dir = std::env::temp_dir().join(format!(
            "medsim_store_test_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        LocalStore::open(dir).unwrap()
    }

    fn sample_report(n: usize) -> QuizReport {
        QuizReport {
            file_name: format!("file_{}.txt", n),
            date: Utc::now(),
            mode: QuizMode::Training,
            total_questions: 10,
            correct: n,
            incorrect: 10 - n,
            unanswered: 0,
            percentage: (n * 10) as u32,
            time_taken_secs: 30,
            question_results: Vec::new(),
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let store = temp_store("token");
        assert!(store.load_token().is_none());
        store.save_token("jwt-abc");
        assert_eq!(store.load_token().as_deref(), Some("jwt-abc"));
        store.clear_auth();
        assert!(store.load_token().is_none());
    }

    #[test]
    fn test_conversation_roundtrip() {
        let store = temp_store("conversation");
        let history = vec![
            ChatMessage::doctor("Что вас беспокоит?"),
            ChatMessage::patient("Болит живот."),
        ];
        store.save_conversation("case-7", &history);
        let loaded = store.load_conversation("case-7");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].text, "Болит живот.");
        // 其他病例互不影响
        assert!(store.load_conversation("case-8").is_empty());

        store.clear_conversation("case-7");
        assert!(store.load_conversation("case-7").is_empty());
    }

    #[test]
    fn test_conversation_key_sanitized() {
        let store = temp_store("sanitize");
        store.save_conversation("../evil/id", &[ChatMessage::doctor("q")]);
        // 落盘文件留在状态目录里
        assert_eq!(store.load_conversation("../evil/id").len(), 1);
    }

    #[test]
    fn test_quiz_history_is_bounded() {
        let store = temp_store("history");
        for n in 0..55 {
            store.push_quiz_report(sample_report(n), 50);
        }
        let history = store.load_quiz_history();
        assert_eq!(history.len(), 50);
        // 最新的在最前面
        assert_eq!(history[0].file_name, "file_54.txt");
    }

    #[test]
    fn test_corrupted_file_degrades_to_default() {
        let store = temp_store("corrupted");
        fs::write(store.key_path("preferences"), "{ not json").unwrap();
        let prefs = store.load_preferences();
        assert_eq!(prefs.theme, "dark");
    }

    #[test]
    fn test_preferences_roundtrip() {
        let store = temp_store("prefs");
        let mut prefs = store.load_preferences();
        prefs.theme = "light".to_string();
        prefs.music_enabled = true;
        prefs.music_volume = 0.8;
        store.save_preferences(&prefs);

        let loaded = store.load_preferences();
        assert_eq!(loaded.theme, "light");
        assert!(loaded.music_enabled);
    }
}
