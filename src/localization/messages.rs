use crate::utils::MessageFormatter;

/// supported languages for the bot UI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lang {
    #[default]
    Ru,
    En,
}

impl Lang {
    /// creates Lang from Telegram's language_code; the audience is russian-speaking
    /// so everything except english falls back to Ru
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(code) if code.starts_with("en") => Lang::En,
            _ => Lang::Ru,
        }
    }
}

// =============================================================================
// Error messages
// =============================================================================

impl Lang {
    pub fn error_account_access(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Не удалось получить данные аккаунта. Попробуйте позже.",
            Lang::En => "❌ Sorry, there was an error accessing your account. Please try again later.",
        }
    }

    pub fn error_product_unavailable(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Продукт временно недоступен. Попробуйте позже.",
            Lang::En => "❌ The product is temporarily unavailable. Please try again later.",
        }
    }

    pub fn error_payment_init(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Не удалось создать платёж. Попробуйте позже или напишите в поддержку.",
            Lang::En => "❌ Failed to create the payment. Please try again later or contact support.",
        }
    }

    pub fn error_payment_check(&self) -> &'static str {
        match self {
            Lang::Ru => "Не удалось проверить оплату, попробуйте позже",
            Lang::En => "Could not check the payment, please try again later",
        }
    }

    pub fn error_no_purchase(&self) -> &'static str {
        match self {
            Lang::Ru => "Покупка не найдена. Нажмите «Купить», чтобы оформить заказ",
            Lang::En => "No purchase found. Press \"Buy\" to place an order",
        }
    }

    pub fn error_invalid_email(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Похоже, это не email. Введите адрес в формате name@example.com",
            Lang::En => "❌ That doesn't look like an email. Please use the name@example.com format",
        }
    }

    pub fn error_invite_link(&self) -> &'static str {
        match self {
            Lang::Ru => "⚠️ Оплата получена, но не удалось создать ссылку на канал. Напишите в поддержку.",
            Lang::En => "⚠️ Payment received but the channel link could not be created. Please contact support.",
        }
    }

    pub fn error_action_not_found(&self) -> &'static str {
        match self {
            Lang::Ru => "Произошла ошибка: действие не найдено.",
            Lang::En => "Something went wrong: action not found.",
        }
    }

    pub fn error_scenario_function(&self, details: &str) -> String {
        format!("Error: {}", details)
    }

    pub fn error_unexpected(&self) -> &'static str {
        match self {
            Lang::Ru => "Произошла непредвиденная ошибка.",
            Lang::En => "An unexpected error occurred.",
        }
    }
}

// =============================================================================
// Onboarding / menu messages
// =============================================================================

impl Lang {
    pub fn offer_agreement(&self, offer_url: Option<&str>, privacy_url: Option<&str>) -> String {
        let (offer, privacy) = match self {
            Lang::Ru => ("офертой", "политикой конфиденциальности"),
            Lang::En => ("the offer", "the privacy policy"),
        };
        let offer = offer_url
            .map(|url| MessageFormatter::link(offer, url))
            .unwrap_or_else(|| offer.to_string());
        let privacy = privacy_url
            .map(|url| MessageFormatter::link(privacy, url))
            .unwrap_or_else(|| privacy.to_string());

        match self {
            Lang::Ru => format!("При использовании бота вы соглашаетесь с {} и {}.", offer, privacy),
            Lang::En => format!("By using the bot you agree to {} and {}.", offer, privacy),
        }
    }

    pub fn course_intro(&self) -> &'static str {
        match self {
            Lang::Ru => {
                "Доступ к каналу \"Первый шаг\"\n\n\
                Видео уроки по базе языка Го, регулярные эфиры, ответы на вопросы\n\n\
                Цена - 2.490 рублей"
            }
            Lang::En => {
                "Access to the \"First step\" channel\n\n\
                Video lessons on Go basics, regular live streams, Q&A\n\n\
                Price - 2,490 RUB"
            }
        }
    }

    pub fn about_course(&self) -> &'static str {
        match self {
            Lang::Ru => {
                "Что внутри?\n\n\
                Видео уроки по следующим темам:\n\n\
                1. Основные HTTP методы\n\
                2. Что такое REST API?\n\
                3. Что такое Git\n\
                4. Что такое реляционная база данных\n\
                5. Работа с БД\n\n\
                Вместе пишем проекты:\n\n\
                1. Игра \"камень, ножницы, бумага\" с работающим сайтом\n\
                2. Генератор случайных цитат (CRUD операции)\n\
                3. Стена как во ВКонтакте"
            }
            Lang::En => {
                "What's inside?\n\n\
                Video lessons on:\n\n\
                1. Core HTTP methods\n\
                2. What a REST API is\n\
                3. What Git is\n\
                4. What a relational database is\n\
                5. Working with a database\n\n\
                Projects we build together:\n\n\
                1. A \"rock, paper, scissors\" game with a working website\n\
                2. A random quote generator (CRUD)\n\
                3. A social-network style wall"
            }
        }
    }

    pub fn keyboard_updated(&self) -> &'static str {
        match self {
            Lang::Ru => "Обновлённые кнопки:",
            Lang::En => "Here is the updated content with new buttons.",
        }
    }
}

// =============================================================================
// Payment messages
// =============================================================================

impl Lang {
    pub fn ask_email(&self) -> &'static str {
        match self {
            Lang::Ru => "Введите email для получения чека:",
            Lang::En => "Enter your email to receive the receipt:",
        }
    }

    pub fn product_card(&self, name: &str, description: &str) -> String {
        format!(
            "<b>{}</b>\n\n{}",
            MessageFormatter::escape_html(name),
            MessageFormatter::escape_html(description)
        )
    }

    pub fn payment_confirmed(&self) -> &'static str {
        match self {
            Lang::Ru => "Оплата прошла",
            Lang::En => "Payment received",
        }
    }

    pub fn payment_not_confirmed(&self) -> &'static str {
        match self {
            Lang::Ru => "Оплата не прошла",
            Lang::En => "Payment not received yet",
        }
    }

    pub fn channel_link(&self) -> &'static str {
        match self {
            Lang::Ru => "Ссылка на канал:",
            Lang::En => "Your channel link:",
        }
    }

    pub fn admin_payment_notification(
        &self,
        user_id: i64,
        username: Option<&str>,
        amount: i32,
    ) -> String {
        let username = username
            .map(|name| format!(" @{}", MessageFormatter::escape_html(name)))
            .unwrap_or_default();
        match self {
            Lang::Ru => format!("💰 Оплата\n{}{}\n{}₽", user_id, username, amount),
            Lang::En => format!("💰 Payment\n{}{}\n{} RUB", user_id, username, amount),
        }
    }
}

// =============================================================================
// Admin messages
// =============================================================================

impl Lang {
    pub fn admin_greeting(&self) -> &'static str {
        match self {
            Lang::Ru => "Привет, админ!",
            Lang::En => "Hello, admin!",
        }
    }

    pub fn deeplink_menu(&self) -> &'static str {
        match self {
            Lang::Ru => "Меню диплинков:",
            Lang::En => "Deep link menu:",
        }
    }

    pub fn deeplink_choose_source(&self) -> &'static str {
        match self {
            Lang::Ru => "Выбери источник:",
            Lang::En => "Choose a source:",
        }
    }

    pub fn deeplink_choose_target(&self) -> &'static str {
        match self {
            Lang::Ru => "Выбери цель:",
            Lang::En => "Choose a target:",
        }
    }

    pub fn deeplink_enter_link(&self) -> &'static str {
        match self {
            Lang::Ru => "Введи ссылку (где будет размещён диплинк):",
            Lang::En => "Enter the link (where the deep link will be placed):",
        }
    }

    pub fn deeplink_created(&self, link: &str) -> String {
        match self {
            Lang::Ru => format!("Диплинк: {}", link),
            Lang::En => format!("Deep link: {}", link),
        }
    }

    pub fn deeplink_list_empty(&self) -> &'static str {
        match self {
            Lang::Ru => "Диплинков пока нет",
            Lang::En => "No deep links yet",
        }
    }

    pub fn stats(&self, users: i64, paid_users: i64) -> String {
        match self {
            Lang::Ru => format!(
                "📊 <b>Статистика</b>\n\nКоличество пользователей: {}\nКоличество покупок: {}",
                users, paid_users
            ),
            Lang::En => format!(
                "📊 <b>Statistics</b>\n\nUsers: {}\nPaid users: {}",
                users, paid_users
            ),
        }
    }

    pub fn stats_by_deeplink_header(&self) -> &'static str {
        match self {
            Lang::Ru => "\n\n<b>По диплинкам</b> (пользователи / оплаты):",
            Lang::En => "\n\n<b>By deep link</b> (users / paid):",
        }
    }

    pub fn stats_queue(&self, pending: i64, sent: i64, failed: i64) -> String {
        match self {
            Lang::Ru => format!(
                "\n\n<b>Рассылка</b>: в очереди {}, отправлено {}, ошибок {}",
                pending, sent, failed
            ),
            Lang::En => format!(
                "\n\n<b>Broadcast</b>: pending {}, sent {}, failed {}",
                pending, sent, failed
            ),
        }
    }

    pub fn broadcast_prompt(&self) -> &'static str {
        match self {
            Lang::Ru => "Отправь сообщение для рассылки (текст, фото, видео, документ, голосовое…)",
            Lang::En => "Send the message to broadcast (text, photo, video, document, voice…)",
        }
    }

    pub fn broadcast_unsupported(&self) -> &'static str {
        match self {
            Lang::Ru => "Этот тип сообщения не поддерживается для рассылки",
            Lang::En => "This message type can't be broadcast",
        }
    }

    pub fn broadcast_confirm(&self) -> &'static str {
        match self {
            Lang::Ru => "Это сообщение получат все пользователи. Отправляем?",
            Lang::En => "Every user will receive this message. Send it?",
        }
    }

    pub fn broadcast_queued(&self, count: u64) -> String {
        match self {
            Lang::Ru => format!("✅ Рассылка поставлена в очередь: {} сообщений", count),
            Lang::En => format!("✅ Broadcast queued: {} messages", count),
        }
    }

    pub fn broadcast_cancelled(&self) -> &'static str {
        match self {
            Lang::Ru => "Рассылка отменена",
            Lang::En => "Broadcast cancelled",
        }
    }

    pub fn export_caption(&self, rows: usize) -> String {
        match self {
            Lang::Ru => format!("Выгрузка пользователей: {}", rows),
            Lang::En => format!("Users export: {}", rows),
        }
    }

    pub fn scenario_not_found(&self, name: &str) -> String {
        match self {
            Lang::Ru => format!("Сценарий «{}» не найден", MessageFormatter::escape_html(name)),
            Lang::En => format!("Scenario \"{}\" not found", MessageFormatter::escape_html(name)),
        }
    }

    pub fn error_admin_action(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Не удалось выполнить действие, подробности в логах",
            Lang::En => "❌ The action failed, see the logs for details",
        }
    }
}

// =============================================================================
// Button labels
// =============================================================================

impl Lang {
    pub fn button_confirm_offer(&self) -> &'static str {
        match self {
            Lang::Ru => "ПОДТВЕРДИТЬ",
            Lang::En => "CONFIRM",
        }
    }

    pub fn button_buy(&self) -> &'static str {
        match self {
            Lang::Ru => "Купить",
            Lang::En => "Buy",
        }
    }

    pub fn button_about(&self) -> &'static str {
        match self {
            Lang::Ru => "Подробнее",
            Lang::En => "Learn more",
        }
    }

    pub fn button_support(&self) -> &'static str {
        match self {
            Lang::Ru => "Поддержка",
            Lang::En => "Support",
        }
    }

    pub fn button_back(&self) -> &'static str {
        match self {
            Lang::Ru => "⏪ Назад",
            Lang::En => "⏪ Back",
        }
    }

    pub fn button_pay(&self) -> &'static str {
        match self {
            Lang::Ru => "Оплатить",
            Lang::En => "Pay",
        }
    }

    pub fn button_paid(&self) -> &'static str {
        match self {
            Lang::Ru => "Оплатил",
            Lang::En => "I've paid",
        }
    }

    pub fn button_join(&self) -> &'static str {
        match self {
            Lang::Ru => "Вступить",
            Lang::En => "Join",
        }
    }

    pub fn button_deeplinks(&self) -> &'static str {
        match self {
            Lang::Ru => "Диплинк",
            Lang::En => "Deep links",
        }
    }

    pub fn button_stats(&self) -> &'static str {
        match self {
            Lang::Ru => "Статистика",
            Lang::En => "Statistics",
        }
    }

    pub fn button_broadcast(&self) -> &'static str {
        match self {
            Lang::Ru => "Рассылка",
            Lang::En => "Broadcast",
        }
    }

    pub fn button_export(&self) -> &'static str {
        match self {
            Lang::Ru => "Выгрузка",
            Lang::En => "Export",
        }
    }

    pub fn button_create_deeplink(&self) -> &'static str {
        match self {
            Lang::Ru => "Создать диплинк",
            Lang::En => "Create deep link",
        }
    }

    pub fn button_list_deeplinks(&self) -> &'static str {
        match self {
            Lang::Ru => "Список диплинков",
            Lang::En => "List deep links",
        }
    }

    pub fn button_send(&self) -> &'static str {
        match self {
            Lang::Ru => "✅ Отправить",
            Lang::En => "✅ Send",
        }
    }

    pub fn button_cancel(&self) -> &'static str {
        match self {
            Lang::Ru => "❌ Отмена",
            Lang::En => "❌ Cancel",
        }
    }

    pub fn target_name(&self, target: &str) -> String {
        match (self, target) {
            (Lang::Ru, "tripwire") => "Трипвайр".to_string(),
            (Lang::Ru, "main") => "Главная".to_string(),
            (Lang::En, "tripwire") => "Tripwire".to_string(),
            (Lang::En, "main") => "Main".to_string(),
            (_, other) => other.to_string(),
        }
    }
}
