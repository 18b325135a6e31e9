//! Browser-facing HTML pages for the quick-action flow.
//!
//! These are the only HTML surfaces of the core: the result pages opened
//! from chat-card buttons, the custom-silence form and the quick-login page.

/// 操作成功页面
pub fn render_success_page(action_name: &str) -> String {
    page(
        "操作成功",
        "✅",
        "#52c41a",
        "操作成功",
        &format!("告警{action_name}操作已完成，可以关闭此页面"),
        "",
    )
}

/// 操作失败页面。按错误文案归类为三种模板：告警已失效 / 链接已过期 / 通用失败。
pub fn render_error_page(error_msg: &str) -> String {
    let (icon, title, tip) = classify_error(error_msg);
    page("操作失败", icon, "#ff9800", title, error_msg, tip)
}

pub(crate) fn classify_error(error_msg: &str) -> (&'static str, &'static str, &'static str) {
    if contains_any(error_msg, &["未找到指纹", "告警不存在", "告警失效"]) {
        (
            "⏰",
            "告警已失效",
            "此告警可能已被处理或链接已过期(有效期24小时)",
        )
    } else if contains_any(error_msg, &["Token已过期", "Token验证失败", "Token签名无效", "Token格式错误"]) {
        (
            "🔒",
            "链接已过期",
            "快捷操作链接有效期为24小时,请从最新的告警通知中重新访问",
        )
    } else {
        ("❌", "操作失败", "请稍后重试或联系管理员")
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// 自定义静默表单
pub fn render_silence_form(alert_title: &str, fingerprint: &str, token: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>自定义静默</title>
    <style>
        {COMMON_CSS}
        form {{ text-align: left; }}
        label {{ display: block; margin: 12px 0 4px; color: #333; font-size: 14px; }}
        select, textarea {{ width: 100%; padding: 8px; border: 1px solid #d9d9d9; border-radius: 6px; font-size: 14px; }}
        button {{ width: 100%; margin-top: 20px; padding: 10px; background: #1677ff; color: white; border: none; border-radius: 6px; font-size: 16px; cursor: pointer; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="icon">🔕</div>
        <h1>静默告警</h1>
        <p class="msg">{alert_title}</p>
        <form method="POST" action="/api/v1/alert/quick-silence">
            <input type="hidden" name="fingerprint" value="{fingerprint}">
            <input type="hidden" name="token" value="{token}">
            <label for="duration">静默时长</label>
            <select id="duration" name="duration">
                <option value="1h">1小时</option>
                <option value="6h">6小时</option>
                <option value="12h">12小时</option>
                <option value="24h">24小时</option>
                <option value="72h">3天</option>
                <option value="168h">7天</option>
            </select>
            <label for="reason">静默原因</label>
            <textarea id="reason" name="reason" rows="3" required placeholder="请填写静默原因"></textarea>
            <button type="submit">确认静默</button>
        </form>
    </div>
</body>
</html>"#
    )
}

/// 快捷操作登录页。登录成功后脚本写入 Authorization Cookie
/// (max-age=86400) 并跳转回原始链接。
pub fn render_login_page(redirect: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>登录</title>
    <style>
        {COMMON_CSS}
        form {{ text-align: left; }}
        label {{ display: block; margin: 12px 0 4px; color: #333; font-size: 14px; }}
        input {{ width: 100%; padding: 8px; border: 1px solid #d9d9d9; border-radius: 6px; font-size: 14px; box-sizing: border-box; }}
        button {{ width: 100%; margin-top: 20px; padding: 10px; background: #1677ff; color: white; border: none; border-radius: 6px; font-size: 16px; cursor: pointer; }}
        .error {{ color: #ff4d4f; font-size: 13px; margin-top: 10px; display: none; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="icon">🔐</div>
        <h1>登录后继续操作</h1>
        <form id="login-form">
            <label for="username">用户名</label>
            <input id="username" name="username" autocomplete="username" required>
            <label for="password">密码</label>
            <input id="password" name="password" type="password" autocomplete="current-password" required>
            <button type="submit">登录</button>
            <div class="error" id="error"></div>
        </form>
    </div>
    <script>
        document.getElementById('login-form').addEventListener('submit', async function(e) {{
            e.preventDefault();
            const resp = await fetch('/api/v1/alert/quick-login', {{
                method: 'POST',
                headers: {{ 'Content-Type': 'application/json' }},
                body: JSON.stringify({{
                    username: document.getElementById('username').value,
                    password: document.getElementById('password').value,
                    redirect: {redirect_json},
                }}),
            }});
            const body = await resp.json();
            const errorBox = document.getElementById('error');
            if (body.code !== 200 || !body.data || !body.data.token) {{
                errorBox.textContent = body.msg || '登录失败';
                errorBox.style.display = 'block';
                return;
            }}
            document.cookie = 'Authorization=' + body.data.token + '; path=/; max-age=86400';
            window.location.href = {redirect_json} || '/';
        }});
    </script>
</body>
</html>"#,
        redirect_json = serde_json::json!(redirect),
    )
}

const COMMON_CSS: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex; justify-content: center; align-items: center;
            min-height: 100vh;
            background: linear-gradient(135deg, #f5f7fa 0%, #c3cfe2 100%);
            padding: 20px;
        }
        .container {
            text-align: center; background: white; padding: 40px 30px;
            border-radius: 16px; box-shadow: 0 10px 40px rgba(0,0,0,0.15);
            max-width: 400px; width: 100%;
        }
        .icon { font-size: 64px; margin-bottom: 20px; }
        h1 { margin: 0 0 15px 0; font-size: 24px; font-weight: 600; }
        .msg { color: #666; font-size: 14px; line-height: 1.6; }
        .tip { color: #999; font-size: 13px; margin-top: 16px; }"#;

fn page(
    title: &str,
    icon: &str,
    title_color: &str,
    heading: &str,
    message: &str,
    tip: &str,
) -> String {
    let tip_html = if tip.is_empty() {
        String::new()
    } else {
        format!(r#"<div class="tip">{tip}</div>"#)
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        {COMMON_CSS}
        h1 {{ color: {title_color}; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="icon">{icon}</div>
        <h1>{heading}</h1>
        <div class="msg">{message}</div>
        {tip_html}
    </div>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_page_buckets() {
        assert_eq!(classify_error("未找到指纹为 x 的告警 或者告警失效了").1, "告警已失效");
        assert_eq!(classify_error("Token验证失败: Token已过期").1, "链接已过期");
        assert_eq!(classify_error("无效的静默时长: 1x").1, "操作失败");
    }

    #[test]
    fn silence_form_embeds_hidden_fields() {
        let html = render_silence_form("磁盘探测", "fp-9", "tk-1");
        assert!(html.contains(r#"name="fingerprint" value="fp-9""#));
        assert!(html.contains(r#"name="token" value="tk-1""#));
        assert!(html.contains("磁盘探测"));
    }

    #[test]
    fn login_page_preserves_redirect() {
        let html = render_login_page("https://api/x?a=1");
        assert!(html.contains("https://api/x?a=1"));
        assert!(html.contains("max-age=86400"));
    }
}
