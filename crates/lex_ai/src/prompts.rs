pub fn interpretation_prompt(question: &str, sources: &str, correction: Option<&str>) -> String {
    // Contract for the model:
    // - answer only from the cited articles
    // - cite by "Статья N"
    // - short, fixed three-part layout
    let correction = correction
        .map(|c| format!("\nИсправление (обязательно учти): {c}\n"))
        .unwrap_or_default();
    format!(
        r#"Ты опытный юрист-консультант, специализирующийся на гражданском праве Кыргызской Республики.
Отвечай кратко (3-5 предложений), строго по закону, используя только статьи из контекста ниже.

Правила:
1) Используй ТОЛЬКО приведенные статьи. Не выдумывай нормы.
2) Ссылайся на статьи в форме "Статья N".
3) Не повторяй вопрос и не добавляй нерелевантные статьи.
4) Если статьи не отвечают на вопрос, так и скажи.
{correction}
Формат ответа:
Ответ: краткий юридический ответ
Основание: Статья N и краткое описание нормы
Совет: короткая практическая рекомендация

Вопрос: {question}

Статьи Гражданского кодекса КР:
{sources}

Ответ:"#
    )
}

pub fn review_judge_prompt(question: &str, sources: &str, response: &str) -> String {
    format!(
        r#"Ты эксперт по контролю качества юридических консультаций. Оцени ответ на юридический вопрос.

Вопрос пользователя: {question}

Юридические статьи:
{sources}

Предоставленный ответ:
{response}

Критерии:
1) Точность: соответствует ли ответ приведенным статьям?
2) Полнота: отвечает ли он на вопрос?
3) Ясность: понятен ли ответ?

Ответь строго в формате:
APPROVED: yes|no
NOTES: замечания, если есть
"#
    )
}

pub fn summary_prompt(text: &str, target_chars: usize) -> String {
    format!(
        r#"Ты редактор юридических ответов.
Сократи текст до {target_chars} символов или меньше, сохранив юридическую суть.
Каждая ссылка на статью (например "Статья 22") должна остаться в тексте дословно.
Не меняй структуру "Ответ:", "Основание:", "Совет:". Не добавляй разметку.

Текст:
{text}

Краткое резюме:"#
    )
}

pub fn translation_prompt(text: &str, from: &str, to: &str) -> String {
    format!(
        r#"Translate the following text from {from} to {to}.
Keep article numbers, names and legal terms accurate. Keep the number of sentences unchanged.
Return only the translation, without comments.

Text:
{text}

Translation:"#
    )
}
