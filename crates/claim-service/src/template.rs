//! 消息模板渲染
//!
//! 识别 `{content}` 和 `{name}` 两个替换变量。渲染是全函数：
//! 模板引用了未提供的变量时，降级为原始模板文本加一条可见的诊断说明，
//! 绝不向调用方抛错：调用方永远要有内容可发。

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

/// 模板变量集
#[derive(Debug, Default, Clone)]
pub struct TemplateVars {
    values: HashMap<&'static str, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// 奖励内容（唯一活动的物品载荷或标准活动的共享内容）
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.values.insert("content", content.into());
        self
    }

    /// 用户显示名
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.values.insert("name", name.into());
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// 模板渲染器
pub struct TemplateRenderer {
    variable_regex: Regex,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            // 匹配 {variable_name} 格式，变量名支持字母、数字、下划线
            variable_regex: Regex::new(r"\{(\w+)\}").expect("variable regex is valid"),
        }
    }

    /// 渲染模板
    ///
    /// 所有引用的变量都存在时返回替换后的文本；
    /// 任一变量缺失时返回原始模板全文并附加诊断说明。
    pub fn render(&self, template: &str, vars: &TemplateVars) -> String {
        let missing = self.missing_variables(template, vars);
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "template references unknown variables, sending raw content"
            );
            return format!(
                "{}\n\n⚠️ (template error: missing variable(s) {})",
                template,
                missing.join(", ")
            );
        }

        self.variable_regex
            .replace_all(template, |caps: &regex::Captures| {
                // missing_variables 已保证所有变量都存在
                vars.get(&caps[1]).unwrap_or_default().to_string()
            })
            .into_owned()
    }

    /// 有模板用模板，没有用默认文案
    pub fn render_or_default(
        &self,
        template: Option<&str>,
        default: &str,
        vars: &TemplateVars,
    ) -> String {
        match template {
            Some(t) if !t.trim().is_empty() => self.render(t, vars),
            _ => self.render(default, vars),
        }
    }

    /// 模板中引用但变量集里没有的名字
    fn missing_variables(&self, template: &str, vars: &TemplateVars) -> Vec<String> {
        self.variable_regex
            .captures_iter(template)
            .filter_map(|caps| {
                let name = &caps[1];
                if vars.get(name).is_none() {
                    Some(name.to_string())
                } else {
                    None
                }
            })
            .collect()
    }
}
