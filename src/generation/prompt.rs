//! Prompt construction.
//!
//! The footer below fixes the output grammar that [`super::parser`] matches.
//! Both sides are built from the constants in this module, so a change to the
//! grammar only has to be made here.

use super::question::OPTION_COUNT;
use super::request::{GenerationRequest, QuestionType};

pub const QUESTION_MARKER: &str = "السؤال";
pub const ANSWER_MARKER: &str = "الإجابة الصحيحة";
pub const OPTION_LABELS: [char; OPTION_COUNT] = ['أ', 'ب', 'ج', 'د'];
pub const LATIN_OPTION_LABELS: [char; OPTION_COUNT] = ['A', 'B', 'C', 'D'];

pub const SYSTEM_PROMPT: &str = "أنت معلم خبير ومؤلف مناهج دراسية. \
تكتب أسئلة اختيار من متعدد دقيقة وواضحة باللغة العربية الفصحى، \
وتلتزم تماماً بالتنسيق المطلوب دون أي مقدمات أو تعليقات.";

pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = match request.question_type {
        QuestionType::PassageBased => passage_prompt(request),
        QuestionType::General => general_prompt(request),
    };
    prompt.push_str(&footer());
    prompt
}

fn passage_prompt(request: &GenerationRequest) -> String {
    let passage = request.passage().unwrap_or_default();

    format!(
        "اقرأ النص التالي بعناية:\n\n{passage}\n\n\
         اكتب {count} من أسئلة الاختيار من متعدد حول هذا النص لطلاب الصف {grade}، \
         بمستوى صعوبة {difficulty}.\n\
         يجب أن تغطي الأسئلة: الفهم المباشر للنص، والأفكار الرئيسية، والتفاصيل المهمة، والاستنتاج.\n",
        count = request.count,
        grade = request.grade,
        difficulty = request.difficulty.label_ar(),
    )
}

fn general_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "اكتب {count} من أسئلة الاختيار من متعدد لطلاب الصف {grade}",
        count = request.count,
        grade = request.grade,
    );
    if let Some(subject) = request.subject_name() {
        prompt.push_str(&format!(" في مادة {subject}"));
    }
    prompt.push_str(&format!(
        "، بمستوى صعوبة {}.\n",
        request.difficulty.label_ar()
    ));
    if let Some(topic) = request.topic() {
        prompt.push_str(&format!("ركّز على موضوع: {topic}.\n"));
    }
    prompt.push_str("يجب أن تتوافق الأسئلة مع المنهج الدراسي لهذا الصف.\n");
    prompt
}

fn footer() -> String {
    let labels = OPTION_LABELS
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join("، ");

    let mut footer = format!(
        "\nالشروط:\n\
         - لكل سؤال {OPTION_COUNT} خيارات بالضبط مرقمة بالحروف {labels}.\n\
         - إجابة صحيحة واحدة فقط لكل سؤال.\n\
         - اجعل الخيارات متقاربة في الطول.\n\
         - لا تستخدم صيغة النفي في الأسئلة.\n\n\
         اكتب كل سؤال بالتنسيق التالي تماماً، مع سطر فارغ بين الأسئلة:\n\n"
    );

    let placeholders = [
        "[الخيار الأول]",
        "[الخيار الثاني]",
        "[الخيار الثالث]",
        "[الخيار الرابع]",
    ];
    footer.push_str(&render_grammar(
        "[نص السؤال]",
        &placeholders,
        "[حرف الإجابة الصحيحة]",
    ));
    footer
}

fn render_grammar(question: &str, options: &[&str; OPTION_COUNT], answer: &str) -> String {
    let mut block = format!("{QUESTION_MARKER}: {question}\n");
    for (label, option) in OPTION_LABELS.iter().zip(options) {
        block.push_str(&format!("{label}) {option}\n"));
    }
    block.push_str(&format!("{ANSWER_MARKER}: {answer}\n"));
    block
}

/// Renders one question exactly the way the model is asked to answer.
pub fn render_block(question: &str, options: &[&str; OPTION_COUNT], correct_index: usize) -> String {
    let answer = OPTION_LABELS
        .get(correct_index)
        .copied()
        .unwrap_or(OPTION_LABELS[0]);
    render_grammar(question, options, &answer.to_string())
}
