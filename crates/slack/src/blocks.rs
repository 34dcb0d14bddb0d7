use serde::Serialize;

use clubbot_core::domain::suggestion::SuggestionCategory;

pub const GUIDE_OPEN_SUGGESTION_ACTION: &str = "guide_open_suggestion";
pub const EVENT_RESPONSE_ACTION_PREFIX: &str = "event_response_";
pub const SUGGESTION_MODAL_CALLBACK: &str = "suggestion_modal";

pub const SUGGESTION_CATEGORY_BLOCK: &str = "suggestion_category";
pub const SUGGESTION_TITLE_BLOCK: &str = "suggestion_title";
pub const SUGGESTION_CONTENT_BLOCK: &str = "suggestion_content";
pub const SUGGESTION_CATEGORY_INPUT: &str = "category";
pub const SUGGESTION_TITLE_INPUT: &str = "title";
pub const SUGGESTION_CONTENT_INPUT: &str = "content";

pub const NAME_FORMAT_HINT: &str = "이름/학번 두 자리 (예: 홍길동/23)";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionElement {
    Button(ButtonElement),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    PlainTextInput {
        action_id: String,
        multiline: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
    StaticSelect {
        action_id: String,
        options: Vec<SelectOption>,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<TextObject>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ActionElement> },
    Context { block_id: String, elements: Vec<TextObject> },
    Input { block_id: String, label: TextObject, element: InputElement },
    Divider,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ActionElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(ActionElement::Button(button));
        self
    }

    fn build(self) -> Vec<ActionElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// A modal opened with `views.open`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub view_type: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_metadata: Option<String>,
}

pub fn guide_message() -> MessageTemplate {
    MessageBuilder::new("동아리 봇 사용 가이드")
        .section("guide.header.v1", |section| {
            section.mrkdwn("*동아리 봇 사용 가이드*");
        })
        .section("guide.commands.v1", |section| {
            section.mrkdwn(
                "• `/가이드` 이 안내를 다시 봅니다\n• `/건의` 운영진에게 익명 건의를 보냅니다",
            );
        })
        .section("guide.name_format.v1", |section| {
            section.mrkdwn(format!("*표시 이름 규칙*\n{NAME_FORMAT_HINT}"));
        })
        .actions("guide.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(GUIDE_OPEN_SUGGESTION_ACTION, "익명 건의하기")
                    .style(ButtonStyle::Primary),
            );
        })
        .build()
}

pub fn welcome_message(display_name: &str, name_format_valid: bool) -> MessageTemplate {
    let builder = MessageBuilder::new(format!("{display_name}님, 동아리에 오신 것을 환영합니다!"))
        .section("welcome.greeting.v1", |section| {
            section.mrkdwn(format!("*{display_name}님, 환영합니다!* :wave:"));
        });

    let builder = if name_format_valid {
        builder
    } else {
        builder.section("welcome.name_format.v1", |section| {
            section.mrkdwn(format!(
                "표시 이름을 규칙에 맞게 바꿔 주세요: {NAME_FORMAT_HINT}"
            ));
        })
    };

    builder
        .context("welcome.guide.v1", |context| {
            context.mrkdwn("`/가이드` 로 봇 사용법을 확인할 수 있어요.");
        })
        .build()
}

pub fn name_warning_message(display_name: &str) -> MessageTemplate {
    MessageBuilder::new("표시 이름 형식을 확인해 주세요")
        .section("name_warning.summary.v1", |section| {
            section.mrkdwn(format!(
                ":warning: 현재 표시 이름 `{display_name}` 이(가) 동아리 규칙과 다릅니다."
            ));
        })
        .section("name_warning.rule.v1", |section| {
            section.mrkdwn(format!("*규칙*: {NAME_FORMAT_HINT}"));
        })
        .build()
}

pub fn suggestion_modal() -> ModalView {
    let options = SuggestionCategory::ALL
        .iter()
        .map(|category| SelectOption {
            text: TextObject::plain(category.label()),
            value: category.as_str().to_string(),
        })
        .collect();

    ModalView {
        view_type: "modal",
        callback_id: SUGGESTION_MODAL_CALLBACK.to_string(),
        title: TextObject::plain("익명 건의"),
        submit: TextObject::plain("보내기"),
        close: TextObject::plain("취소"),
        blocks: vec![
            Block::Context {
                block_id: "suggestion.notice.v1".to_string(),
                elements: vec![TextObject::mrkdwn("작성자 정보는 저장되지 않습니다.")],
            },
            Block::Input {
                block_id: SUGGESTION_CATEGORY_BLOCK.to_string(),
                label: TextObject::plain("분류"),
                element: InputElement::StaticSelect {
                    action_id: SUGGESTION_CATEGORY_INPUT.to_string(),
                    options,
                    placeholder: Some(TextObject::plain("분류를 선택하세요")),
                },
            },
            Block::Input {
                block_id: SUGGESTION_TITLE_BLOCK.to_string(),
                label: TextObject::plain("제목"),
                element: InputElement::PlainTextInput {
                    action_id: SUGGESTION_TITLE_INPUT.to_string(),
                    multiline: false,
                    placeholder: None,
                },
            },
            Block::Input {
                block_id: SUGGESTION_CONTENT_BLOCK.to_string(),
                label: TextObject::plain("내용"),
                element: InputElement::PlainTextInput {
                    action_id: SUGGESTION_CONTENT_INPUT.to_string(),
                    multiline: true,
                    placeholder: None,
                },
            },
        ],
        private_metadata: None,
    }
}

pub fn suggestion_received_message() -> MessageTemplate {
    MessageBuilder::new("건의가 익명으로 접수되었습니다")
        .section("suggestion.received.v1", |section| {
            section.mrkdwn(":inbox_tray: 건의가 익명으로 접수되었습니다. 소중한 의견 감사합니다!");
        })
        .build()
}

pub fn rsvp_recorded_message(event_title: &str, response: &str) -> MessageTemplate {
    MessageBuilder::new(format!("{event_title}: {response} 응답이 기록되었습니다"))
        .section("rsvp.recorded.v1", |section| {
            section.mrkdwn(format!("*{event_title}* 에 `{response}` (으)로 응답했습니다."));
        })
        .build()
}

pub fn mention_placeholder_message() -> MessageTemplate {
    MessageBuilder::new("질문을 확인했어요. 답변 기능은 준비 중입니다.")
        .section("mention.placeholder.v1", |section| {
            section.plain("질문을 확인했어요. 답변 기능은 준비 중입니다.");
        })
        .build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(summary.to_owned())
        .section("error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {summary}"));
        })
        .context("error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}
