use medsim_client::clients::{
    AuthClient, CaseClient, DiagnosticClient, MedcoinClient, SubscriptionClient, TreatmentClient,
};
use medsim_client::utils::logging;
use medsim_client::workflow::CaseSession;
use medsim_client::{AppContext, Config};

/// 构建指向真实后端的上下文
///
/// 需要后端已启动（MEDSIM_API_BASE_URL，默认 http://localhost:3001）
fn live_context() -> AppContext {
    logging::init(true);
    let mut config = Config::from_env();
    config.storage_dir = std::env::temp_dir()
        .join("medsim_integration")
        .to_string_lossy()
        .to_string();
    AppContext::new(config).expect("创建上下文失败")
}

async fn login(app: &AppContext) {
    let email = std::env::var("MEDSIM_LOGIN_EMAIL").expect("需要 MEDSIM_LOGIN_EMAIL");
    let password = std::env::var("MEDSIM_LOGIN_PASSWORD").expect("需要 MEDSIM_LOGIN_PASSWORD");
    let session = AuthClient::new()
        .login(&app.http, &email, &password)
        .await
        .expect("登录失败");
    app.save_session(&session);
}

#[tokio::test]
#[ignore] // 默认忽略，需要后端在跑：cargo test -- --ignored
async fn test_login_and_profile() {
    let app = live_context();
    login(&app).await;

    let user = AuthClient::new()
        .current_user(&app.http)
        .await
        .expect("获取用户失败");
    assert!(user.is_some(), "登录后应能拿到用户资料");

    let balance = MedcoinClient::new()
        .balance(&app.http)
        .await
        .expect("查询余额失败");
    assert!(balance.balance >= 0);
}

#[tokio::test]
#[ignore]
async fn test_load_catalogs() {
    let app = live_context();

    let diagnostic = DiagnosticClient::new()
        .catalog(&app.http)
        .await
        .expect("检查目录加载失败");
    assert!(!diagnostic.is_empty(), "检查目录不应为空");

    let treatment = TreatmentClient::new()
        .catalog(&app.http)
        .await
        .expect("治疗目录加载失败");
    assert!(!treatment.is_empty(), "治疗目录不应为空");
}

#[tokio::test]
#[ignore]
async fn test_case_list_and_detail() {
    let app = live_context();

    let cases = CaseClient::new()
        .list_cases(&app.http)
        .await
        .expect("病例列表加载失败");
    assert!(!cases.is_empty(), "病例列表不应为空");

    let detail = CaseClient::new()
        .get_case(&app.http, &cases[0].id)
        .await
        .expect("病例详情加载失败");
    assert_eq!(detail.id.as_deref(), Some(cases[0].id.as_str()));
}

#[tokio::test]
#[ignore]
async fn test_modules_plans_and_transactions() {
    let app = live_context();
    login(&app).await;

    let modules = CaseClient::new()
        .list_modules(&app.http)
        .await
        .expect("模块列表加载失败");
    assert!(!modules.is_null());

    let methods = DiagnosticClient::new()
        .methods(&app.http)
        .await
        .expect("诊断方法加载失败");
    assert!(!methods.is_null());

    let plans = SubscriptionClient::new()
        .plans(&app.http)
        .await
        .expect("套餐列表加载失败");
    assert!(!plans.is_empty(), "套餐列表不应为空");

    let transactions = MedcoinClient::new()
        .transactions(&app.http, 10, 0)
        .await
        .expect("流水加载失败");
    assert!(transactions.total >= transactions.transactions.len() as i64);
}

#[tokio::test]
#[ignore]
async fn test_case_access_check() {
    let app = live_context();
    login(&app).await;

    let cases = CaseClient::new()
        .list_cases(&app.http)
        .await
        .expect("病例列表加载失败");
    let access = SubscriptionClient::new()
        .check_access(&app.http, &cases[0].id)
        .await;
    // 拒绝时必须带原因
    if !access.has_access {
        assert!(access.reason.is_some());
    }
}

#[tokio::test]
#[ignore]
async fn test_register_new_account() {
    let app = live_context();
    let email = format!(
        "medsim-it-{}@example.com",
        chrono::Utc::now().timestamp_millis()
    );

    let session = AuthClient::new()
        .register(&app.http, &email, "test-password-123", "Интеграционный тест")
        .await
        .expect("注册失败");
    assert!(!session.token.is_empty());
}

/// 完整走一遍问诊前几轮（会消耗医币）
#[tokio::test]
#[ignore]
async fn test_interview_first_exchanges() {
    let app = live_context();
    login(&app).await;

    let cases = CaseClient::new()
        .list_cases(&app.http)
        .await
        .expect("病例列表加载失败");
    let mut session = CaseSession::load(&app, &cases[0].id)
        .await
        .expect("病例加载失败");

    let reply = session
        .ask(&app, "Что вас беспокоит?")
        .await
        .expect("发送消息失败");
    assert!(!reply.is_empty(), "患者应当有回答");
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.progress().questions_count, 1);
    assert_eq!(session.language(), Some("ru"));
}
