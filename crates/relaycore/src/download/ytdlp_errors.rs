//! Разбор stderr yt-dlp.
//!
//! Превращает текст ошибки в один из вариантов [`ExtractError`], чтобы
//! пользователь получил понятное сообщение вместо общего «не удалось скачать».

use crate::download::source::ExtractError;

/// Сколько символов stderr сохраняем в ошибке
const DETAIL_LIMIT: usize = 300;

/// Определяет тип ошибки по stderr yt-dlp.
///
/// Порядок проверок важен: «login required» в Instagram часто идёт вместе
/// с «unavailable», и такой пост нужно считать приватным; сетевые ошибки
/// проверяются раньше удалённых постов.
pub fn classify_stderr(stderr: &str) -> ExtractError {
    let stderr_lower = stderr.to_lowercase();
    let detail = last_error_line(stderr);

    // Приватный контент / требуется вход
    if stderr_lower.contains("private")
        || stderr_lower.contains("login required")
        || stderr_lower.contains("log in")
        || stderr_lower.contains("login_required")
        || stderr_lower.contains("protected")
        || stderr_lower.contains("sign in")
        || stderr_lower.contains("age-restricted")
        || stderr_lower.contains("nsfw tweet")
        || stderr_lower.contains("requested content is not available, rate-limit reached or login required")
    {
        return ExtractError::Private(detail);
    }

    // В посте нет видео
    if stderr_lower.contains("no video")
        || stderr_lower.contains("there's no video")
        || stderr_lower.contains("no media")
        || stderr_lower.contains("does not contain")
    {
        return ExtractError::NoVideo(detail);
    }

    // Сетевые ошибки и 5xx. Проверяем до «unavailable»: у 503 в тексте
    // «Service Unavailable», а пост при этом жив
    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("http error 5")
        || stderr_lower.contains("service unavailable")
        || stderr_lower.contains("bad gateway")
        || stderr_lower.contains("ssl")
    {
        return ExtractError::Network(detail);
    }

    // Пост удалён или недоступен
    if stderr_lower.contains("not found")
        || stderr_lower.contains("http error 404")
        || stderr_lower.contains("has been removed")
        || stderr_lower.contains("deleted")
        || stderr_lower.contains("unavailable")
        || stderr_lower.contains("suspended")
        || stderr_lower.contains("does not exist")
    {
        return ExtractError::Unavailable(detail);
    }

    ExtractError::Failed(detail)
}

/// Последняя строка с `ERROR:` (или просто последняя непустая строка).
fn last_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.contains("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("")
        .trim();
    line.chars().take(DETAIL_LIMIT).collect()
}
